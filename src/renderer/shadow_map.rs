use std::ops::{Deref, DerefMut};

use glam::{Mat4, Vec3};

use crate::error::RendererError;
use crate::renderer::device::{
    ClearFlags, DepthTargetId, GpuResource, RenderDevice, TextureSource, Viewport,
};
use crate::renderer::lights::LightKind;

pub const DEFAULT_SHADOW_MAP_SIZE: u32 = 1024;
/// Texture unit the shadow map is sampled from in the lit programs.
pub const SHADOW_TEXTURE_UNIT: u32 = 1;
/// Constant depth bias subtracted before the shadow comparison.
pub const SHADOW_BIAS: f32 = 0.01;

const ORTHO_HALF_EXTENT: f32 = 5.0;
const ORTHO_NEAR: f32 = 1.0;
const ORTHO_FAR: f32 = 50.0;
const PERSPECTIVE_FOV_DEGREES: f32 = 90.0;
const PERSPECTIVE_NEAR: f32 = 1.0;
const PERSPECTIVE_FAR: f32 = 100.0;

fn shadow_up(position: Vec3, target: Vec3) -> Vec3 {
    let forward = (target - position).normalize_or_zero();
    if forward.dot(Vec3::Y).abs() > 0.999 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// World to light clip space for a caster at `position` looking at `target`.
pub fn light_space_transform(position: Vec3, target: Vec3, kind: LightKind) -> Mat4 {
    let view = Mat4::look_at_rh(position, target, shadow_up(position, target));
    let projection = match kind {
        LightKind::Directional => Mat4::orthographic_rh(
            -ORTHO_HALF_EXTENT,
            ORTHO_HALF_EXTENT,
            -ORTHO_HALF_EXTENT,
            ORTHO_HALF_EXTENT,
            ORTHO_NEAR,
            ORTHO_FAR,
        ),
        LightKind::Point | LightKind::Spot => Mat4::perspective_rh(
            PERSPECTIVE_FOV_DEGREES.to_radians(),
            1.0,
            PERSPECTIVE_NEAR,
            PERSPECTIVE_FAR,
        ),
    };
    projection * view
}

/// Depth-only render target plus the light-space transform of the current
/// shadow caster.
pub struct ShadowMap {
    width: u32,
    height: u32,
    target: Option<GpuResource<DepthTargetId>>,
    light_space_matrix: Mat4,
}

impl ShadowMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            target: None,
            light_space_matrix: Mat4::IDENTITY,
        }
    }

    /// Allocates (or reallocates) the depth target. On failure the previous
    /// target is kept.
    pub fn configure<D: RenderDevice>(
        &mut self,
        device: &mut D,
        width: u32,
        height: u32,
    ) -> Result<(), RendererError> {
        if width == 0 || height == 0 {
            return Err(RendererError::InvalidShadowSize { width, height });
        }
        let target = device.create_depth_target(width, height)?;
        self.target = Some(GpuResource::new(target, device.releaser()));
        self.width = width;
        self.height = height;
        log::debug!("Shadow map allocated at {width}x{height}");
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_allocated(&self) -> bool {
        self.target.is_some()
    }

    pub fn light_space_matrix(&self) -> Mat4 {
        self.light_space_matrix
    }

    pub fn compute_light_space_transform(
        &mut self,
        light_position: Vec3,
        target: Vec3,
        kind: LightKind,
    ) -> Mat4 {
        self.light_space_matrix = light_space_transform(light_position, target, kind);
        self.light_space_matrix
    }

    /// Binds the depth target at shadow resolution and clears it. The pass
    /// ends when the returned scope is dropped. `None` if not allocated.
    pub fn begin_depth_pass<'d, D: RenderDevice>(
        &self,
        device: &'d mut D,
    ) -> Option<DepthPass<'d, D>> {
        let target = self.target.as_ref()?.handle();
        device.bind_target(Some(target));
        device.set_viewport(Viewport::full(self.width, self.height));
        device.clear(ClearFlags::DEPTH);
        Some(DepthPass { device })
    }

    /// Restores the default framebuffer and a drawable-sized viewport.
    pub fn end_depth_pass<D: RenderDevice>(device: &mut D) {
        let (width, height) = device.drawable_size();
        device.bind_target(None);
        device.set_viewport(Viewport::full(width, height));
    }

    pub fn bind_for_sampling<D: RenderDevice>(&self, device: &mut D, unit: u32) {
        let source = self
            .target
            .as_ref()
            .map_or(TextureSource::None, |target| TextureSource::Depth(target.handle()));
        device.bind_texture(unit, source);
    }
}

/// Scope of a depth-only pass. Dereferences to the device.
pub struct DepthPass<'d, D: RenderDevice> {
    device: &'d mut D,
}

impl<D: RenderDevice> Deref for DepthPass<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &*self.device
    }
}

impl<D: RenderDevice> DerefMut for DepthPass<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut *self.device
    }
}

impl<D: RenderDevice> Drop for DepthPass<'_, D> {
    fn drop(&mut self) {
        ShadowMap::end_depth_pass(self.device);
    }
}
