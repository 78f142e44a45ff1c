use glam::{Mat4, Vec3};

use crate::error::RendererError;
use crate::renderer::device::{ClearFlags, GpuResource, ProgramId, RenderDevice, Viewport};
use crate::renderer::ground::{GroundPlane, GroundUniforms};
use crate::renderer::lights::{
    DirectionalLight, LightRegistry, LightUniforms, PointLight, SpotLight,
};
use crate::renderer::material::{MaterialUniforms, DIFFUSE_TEXTURE_UNIT};
use crate::renderer::programs::{self, DEPTH_PROGRAM, GROUND_PROGRAM, MESH_PROGRAM};
use crate::renderer::shadow_map::{ShadowMap, SHADOW_BIAS, SHADOW_TEXTURE_UNIT};
use crate::renderer::uniforms::{UniformLocation, UniformResolver, UniformValue};
use crate::scene::camera::Camera;
use crate::scene::model::Model;
use crate::settings::RenderSettings;

/// Advances an angle in degrees by `speed * delta`, wrapped to `[0, 360)`.
pub fn advance_rotation(angle: f32, speed: f32, delta_seconds: f32) -> f32 {
    wrap_degrees(angle + speed * delta_seconds)
}

/// `rem_euclid` can round a tiny negative angle up to exactly 360.
fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Counters for the most recently rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub shadow_draw_calls: u32,
    pub ground_draw_calls: u32,
    pub mesh_draw_calls: u32,
    pub material_uploads: u32,
    pub texture_binds: u32,
}

impl FrameStats {
    pub fn total_draw_calls(&self) -> u32 {
        self.shadow_draw_calls + self.ground_draw_calls + self.mesh_draw_calls
    }
}

/// Per-frame values shared by both lit programs.
struct LitFrame {
    light_space: Mat4,
    view_pos: Vec3,
    ambient: Vec3,
    shadows: bool,
}

#[derive(Clone, Debug, Default)]
struct LitUniforms {
    light_space_matrix: Option<UniformLocation>,
    view_pos: Option<UniformLocation>,
    ambient: Option<UniformLocation>,
    shadow_bias: Option<UniformLocation>,
    shadows_enabled: Option<UniformLocation>,
    diffuse_sampler: Option<UniformLocation>,
    shadow_sampler: Option<UniformLocation>,
    lights: LightUniforms,
}

impl LitUniforms {
    fn resolve<D: RenderDevice>(resolver: &mut UniformResolver<'_, D>, textured: bool) -> Self {
        Self {
            light_space_matrix: resolver.get("lightSpaceMatrix"),
            view_pos: resolver.get("viewPos"),
            ambient: resolver.get("AmbientLightIntensity"),
            shadow_bias: resolver.get("shadowBias"),
            shadows_enabled: resolver.get("shadowsEnabled"),
            diffuse_sampler: if textured {
                resolver.get("diffuseTexture")
            } else {
                None
            },
            shadow_sampler: resolver.get("shadowMap"),
            lights: LightUniforms::resolve(resolver),
        }
    }

    fn upload<D: RenderDevice>(&self, device: &mut D, lights: &LightRegistry, frame: &LitFrame) {
        device.set_uniform(
            self.diffuse_sampler,
            UniformValue::Int(DIFFUSE_TEXTURE_UNIT as i32),
        );
        device.set_uniform(
            self.shadow_sampler,
            UniformValue::Int(SHADOW_TEXTURE_UNIT as i32),
        );
        device.set_uniform(self.view_pos, UniformValue::Vec3(frame.view_pos));
        device.set_uniform(self.ambient, UniformValue::Vec3(frame.ambient));
        device.set_uniform(self.light_space_matrix, UniformValue::Mat4(frame.light_space));
        device.set_uniform(self.shadow_bias, UniformValue::Float(SHADOW_BIAS));
        device.set_uniform(self.shadows_enabled, UniformValue::Bool(frame.shadows));
        lights.upload(device, &self.lights);
    }
}

struct MeshProgram {
    program: GpuResource<ProgramId>,
    mvp: Option<UniformLocation>,
    view: Option<UniformLocation>,
    model: Option<UniformLocation>,
    lit: LitUniforms,
    material: MaterialUniforms,
}

struct GroundProgram {
    program: GpuResource<ProgramId>,
    uniforms: GroundUniforms,
    lit: LitUniforms,
}

struct DepthProgram {
    program: GpuResource<ProgramId>,
    light_space_model: Option<UniformLocation>,
}

struct Programs {
    mesh: MeshProgram,
    ground: GroundProgram,
    depth: DepthProgram,
}

fn note_missing(unresolved: &mut Vec<String>, label: &str, missing: Vec<String>) {
    unresolved.extend(missing.into_iter().map(|name| format!("{label}.{name}")));
}

impl Programs {
    fn resolve<D: RenderDevice>(
        device: &D,
        mesh: GpuResource<ProgramId>,
        ground: GpuResource<ProgramId>,
        depth: GpuResource<ProgramId>,
        unresolved: &mut Vec<String>,
    ) -> Self {
        let mut resolver = UniformResolver::new(device, mesh.handle());
        let mvp = resolver.get("MVP");
        let view = resolver.get("V");
        let model = resolver.get("M");
        let lit = LitUniforms::resolve(&mut resolver, true);
        let material = MaterialUniforms::resolve(&mut resolver);
        note_missing(unresolved, MESH_PROGRAM, resolver.finish());
        let mesh = MeshProgram {
            program: mesh,
            mvp,
            view,
            model,
            lit,
            material,
        };

        let mut resolver = UniformResolver::new(device, ground.handle());
        let uniforms = GroundUniforms::resolve(&mut resolver);
        let lit = LitUniforms::resolve(&mut resolver, false);
        note_missing(unresolved, GROUND_PROGRAM, resolver.finish());
        let ground = GroundProgram {
            program: ground,
            uniforms,
            lit,
        };

        let mut resolver = UniformResolver::new(device, depth.handle());
        let light_space_model = resolver.get("lightSpaceModel");
        note_missing(unresolved, DEPTH_PROGRAM, resolver.finish());
        let depth = DepthProgram {
            program: depth,
            light_space_model,
        };

        Self {
            mesh,
            ground,
            depth,
        }
    }
}

/// Owns the light registry, shadow map, ground plane and program handles,
/// and draws one model per frame through a [`RenderDevice`].
pub struct SceneRenderer<D: RenderDevice> {
    device: D,
    verify_uniforms: bool,
    lights: LightRegistry,
    shadow_map: ShadowMap,
    ground: Option<GroundPlane>,
    programs: Option<Programs>,
    ambient_light_intensity: Vec3,
    shadows_enabled: bool,
    auto_rotation: bool,
    rotation_speed: f32,
    rotation_angle: f32,
    frame_index: u64,
    stats: FrameStats,
    unresolved_uniforms: Vec<String>,
    warned_uninitialized: bool,
}

impl<D: RenderDevice> SceneRenderer<D> {
    pub fn new(device: D, settings: &RenderSettings) -> Self {
        Self {
            device,
            verify_uniforms: settings.verify_uniforms,
            lights: LightRegistry::new(),
            shadow_map: ShadowMap::new(settings.shadow_map_size, settings.shadow_map_size),
            ground: None,
            programs: None,
            ambient_light_intensity: Vec3::splat(settings.ambient_intensity),
            shadows_enabled: settings.shadows_enabled,
            auto_rotation: settings.auto_rotate,
            rotation_speed: settings.rotation_speed,
            rotation_angle: 0.0,
            frame_index: 0,
            stats: FrameStats::default(),
            unresolved_uniforms: Vec::new(),
            warned_uninitialized: false,
        }
    }

    /// Builds the programs, the shadow target and the ground, resolves every
    /// uniform location and registers the default lights if none were added.
    pub fn initialize(&mut self) -> Result<(), RendererError> {
        let releaser = self.device.releaser();
        let mesh = GpuResource::new(
            self.device.create_program(programs::mesh_program())?,
            releaser.clone(),
        );
        let ground_program = GpuResource::new(
            self.device.create_program(programs::ground_program())?,
            releaser.clone(),
        );
        let depth = GpuResource::new(
            self.device.create_program(programs::depth_program())?,
            releaser,
        );

        let (width, height) = self.shadow_map.size();
        self.shadow_map.configure(&mut self.device, width, height)?;
        let ground = GroundPlane::new(&mut self.device)?;

        let mut unresolved = Vec::new();
        let programs =
            Programs::resolve(&self.device, mesh, ground_program, depth, &mut unresolved);
        if cfg!(debug_assertions) || self.verify_uniforms {
            for name in &unresolved {
                log::warn!("Uniform '{name}' is missing; writes to it are ignored");
            }
        }
        self.unresolved_uniforms = unresolved;

        if self.lights.is_empty() {
            self.register_default_lights();
        }

        self.programs = Some(programs);
        self.ground = Some(ground);
        log::info!("Scene renderer initialized (shadow map {width}x{height})");
        Ok(())
    }

    fn register_default_lights(&mut self) {
        self.lights.add(DirectionalLight::new(Vec3::new(-1.0, -1.0, -1.0)));
        self.lights.add(PointLight::new(Vec3::splat(4.0)));
        self.lights.add(SpotLight::new(Vec3::new(0.0, 4.0, 0.0), Vec3::NEG_Y));
    }

    pub fn is_initialized(&self) -> bool {
        self.programs.is_some()
    }

    /// Renders one frame: shadow pass, ground, then the model batched by
    /// material. Never fails; submission errors are logged.
    pub fn render_scene(&mut self, model: &mut Model, camera: &Camera, delta_seconds: f32) {
        if self.programs.is_none() || self.ground.is_none() {
            if !self.warned_uninitialized {
                log::warn!("render_scene called before initialize(); frame skipped");
                self.warned_uninitialized = true;
            }
            return;
        }
        let (Some(programs), Some(ground)) = (self.programs.as_ref(), self.ground.as_mut()) else {
            return;
        };
        let device = &mut self.device;
        let mut stats = FrameStats::default();

        device.begin_frame();

        let caster = self.lights.shadow_caster();
        let shadows_active =
            self.shadows_enabled && caster.is_some() && self.shadow_map.is_allocated();
        if let (true, Some(caster)) = (self.shadows_enabled, caster) {
            let light_space = self.shadow_map.compute_light_space_transform(
                caster.position,
                caster.target,
                caster.kind,
            );
            if let Some(mut pass) = self.shadow_map.begin_depth_pass(device) {
                let depth = &programs.depth;
                pass.use_program(depth.program.handle());
                stats.shadow_draw_calls +=
                    ground.draw_depth(&mut *pass, depth.light_space_model, light_space);
                stats.shadow_draw_calls +=
                    model.draw_depth(&mut *pass, depth.light_space_model, light_space);
            }
        }

        device.bind_target(None);
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
        let (width, height) = device.drawable_size();
        device.set_viewport(Viewport::full(width, height));
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let view = camera.view_matrix();
        let projection = camera.projection(aspect);

        if self.auto_rotation {
            self.rotation_angle =
                advance_rotation(self.rotation_angle, self.rotation_speed, delta_seconds);
            model.set_rotation(self.rotation_angle, Vec3::Y);
        }

        if model.is_lowest_point_update_needed() {
            if let Some(lowest) = model.lowest_point() {
                ground.place_below(lowest);
                log::debug!("Ground moved to {:.4}", ground.height());
            }
        }

        let lit_frame = LitFrame {
            light_space: self.shadow_map.light_space_matrix(),
            view_pos: camera.position(),
            ambient: self.ambient_light_intensity,
            shadows: shadows_active,
        };

        let ground_program = &programs.ground;
        device.use_program(ground_program.program.handle());
        ground_program.lit.upload(device, &self.lights, &lit_frame);
        self.shadow_map.bind_for_sampling(device, SHADOW_TEXTURE_UNIT);
        stats.ground_draw_calls += ground.draw(device, &ground_program.uniforms, view, projection);

        let mesh = &programs.mesh;
        let model_matrix = model.model_matrix();
        device.use_program(mesh.program.handle());
        device.set_uniform(mesh.mvp, UniformValue::Mat4(projection * view * model_matrix));
        device.set_uniform(mesh.view, UniformValue::Mat4(view));
        device.set_uniform(mesh.model, UniformValue::Mat4(model_matrix));
        mesh.lit.upload(device, &self.lights, &lit_frame);
        let batch = model.draw(device, &mesh.material);
        stats.mesh_draw_calls += batch.draw_calls;
        stats.material_uploads += batch.uniform_uploads;
        stats.texture_binds += batch.texture_binds;

        model.mark_lowest_point_fresh();

        if let Err(err) = device.end_frame() {
            log::warn!("Frame {} was not presented: {err}", self.frame_index);
        }
        if self.frame_index == 0 {
            log::info!(
                "First frame: model at {:?}, ground at {:.3}, {} draw calls",
                model.transform().position,
                ground.height(),
                stats.total_draw_calls()
            );
        }
        self.frame_index += 1;
        self.stats = stats;
    }

    pub fn resize_shadow_map(&mut self, width: u32, height: u32) -> Result<(), RendererError> {
        if !self.is_initialized() {
            return Err(RendererError::NotInitialized);
        }
        self.shadow_map.configure(&mut self.device, width, height)
    }

    /// Moves the first point light; ignored when there is none.
    pub fn set_light_position(&mut self, position: Vec3) {
        match self.lights.point_mut(0) {
            Some(light) => light.position = position,
            None => log::warn!("set_light_position: no point light registered"),
        }
    }

    pub fn lights(&self) -> &LightRegistry {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut LightRegistry {
        &mut self.lights
    }

    pub fn add_directional_light(&mut self, light: DirectionalLight) -> usize {
        self.lights.add(light)
    }

    pub fn add_point_light(&mut self, light: PointLight) -> usize {
        self.lights.add(light)
    }

    pub fn add_spot_light(&mut self, light: SpotLight) -> usize {
        self.lights.add(light)
    }

    pub fn set_ambient_light_intensity(&mut self, intensity: Vec3) {
        self.ambient_light_intensity = intensity;
    }

    pub fn ambient_light_intensity(&self) -> Vec3 {
        self.ambient_light_intensity
    }

    pub fn set_auto_rotation(&mut self, enabled: bool) {
        self.auto_rotation = enabled;
    }

    pub fn auto_rotation(&self) -> bool {
        self.auto_rotation
    }

    pub fn set_rotation_speed(&mut self, degrees_per_second: f32) {
        self.rotation_speed = degrees_per_second;
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    pub fn set_rotation_angle(&mut self, degrees: f32) {
        self.rotation_angle = wrap_degrees(degrees);
    }

    pub fn rotation_angle(&self) -> f32 {
        self.rotation_angle
    }

    pub fn set_shadows_enabled(&mut self, enabled: bool) {
        self.shadows_enabled = enabled;
    }

    pub fn shadows_enabled(&self) -> bool {
        self.shadows_enabled
    }

    pub fn shadow_map(&self) -> &ShadowMap {
        &self.shadow_map
    }

    pub fn ground_height(&self) -> Option<f32> {
        self.ground.as_ref().map(GroundPlane::height)
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.stats
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    /// Names that did not resolve at initialization, as `program.uniform`.
    pub fn unresolved_uniforms(&self) -> &[String] {
        &self.unresolved_uniforms
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_wraps_into_range() {
        assert!((advance_rotation(350.0, 10.0, 3.0) - 20.0).abs() < 1e-4);
        assert!((advance_rotation(10.0, -10.0, 2.0) - 350.0).abs() < 1e-4);
        assert_eq!(advance_rotation(0.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn negative_speed_stays_below_full_turn() {
        for delta in [1e-6, 1e-7, 1e-3, 1.0] {
            let angle = advance_rotation(0.0, -1.0, delta);
            assert!((0.0..360.0).contains(&angle), "{delta} -> {angle}");
        }
        assert_eq!(wrap_degrees(-1e-6), 0.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
    }

    #[test]
    fn stats_sum_draw_calls() {
        let stats = FrameStats {
            shadow_draw_calls: 2,
            ground_draw_calls: 1,
            mesh_draw_calls: 3,
            ..FrameStats::default()
        };
        assert_eq!(stats.total_draw_calls(), 6);
    }
}
