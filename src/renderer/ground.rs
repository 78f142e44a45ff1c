use glam::{Mat4, Vec3};

use crate::error::DeviceError;
use crate::renderer::device::{GeometryId, GpuResource, RenderDevice};
use crate::renderer::primitives::ground_quad;
use crate::renderer::uniforms::{UniformLocation, UniformResolver, UniformValue};

/// Half extent of the ground quad in world units.
pub const GROUND_EXTENT: f32 = 1000.0;
/// Gap kept between the ground and the model's lowest point.
pub const GROUND_CLEARANCE: f32 = 0.001;
pub const DEFAULT_GROUND_HEIGHT: f32 = -0.1;
pub const DEFAULT_GROUND_COLOR: Vec3 = Vec3::new(0.55, 0.55, 0.52);

#[derive(Clone, Copy, Debug, Default)]
pub struct GroundUniforms {
    pub model: Option<UniformLocation>,
    pub view: Option<UniformLocation>,
    pub projection: Option<UniformLocation>,
    pub color: Option<UniformLocation>,
}

impl GroundUniforms {
    pub fn resolve<D: RenderDevice>(resolver: &mut UniformResolver<'_, D>) -> Self {
        Self {
            model: resolver.get("model"),
            view: resolver.get("view"),
            projection: resolver.get("projection"),
            color: resolver.get("groundColor"),
        }
    }
}

/// Large horizontal quad that follows the model's lowest point.
pub struct GroundPlane {
    geometry: GpuResource<GeometryId>,
    index_count: u32,
    height: f32,
    pub color: Vec3,
}

impl GroundPlane {
    pub fn new<D: RenderDevice>(device: &mut D) -> Result<Self, DeviceError> {
        let (vertices, indices) = ground_quad();
        let geometry = device.create_geometry(&vertices, &indices)?;
        Ok(Self {
            geometry: GpuResource::new(geometry, device.releaser()),
            index_count: indices.len() as u32,
            height: DEFAULT_GROUND_HEIGHT,
            color: DEFAULT_GROUND_COLOR,
        })
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn set_height(&mut self, height: f32) {
        self.height = height;
    }

    /// Places the plane just under `lowest_point`.
    pub fn place_below(&mut self, lowest_point: f32) {
        self.height = lowest_point - GROUND_CLEARANCE;
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, self.height, 0.0))
            * Mat4::from_scale(Vec3::new(GROUND_EXTENT, 1.0, GROUND_EXTENT))
    }

    /// Lit draw. The ground program must be current with lights and shadow
    /// state already uploaded.
    pub fn draw<D: RenderDevice>(
        &self,
        device: &mut D,
        uniforms: &GroundUniforms,
        view: Mat4,
        projection: Mat4,
    ) -> u32 {
        device.set_uniform(uniforms.model, UniformValue::Mat4(self.model_matrix()));
        device.set_uniform(uniforms.view, UniformValue::Mat4(view));
        device.set_uniform(uniforms.projection, UniformValue::Mat4(projection));
        device.set_uniform(uniforms.color, UniformValue::Vec3(self.color));
        device.draw_indexed(self.geometry.handle(), self.index_count, 0);
        1
    }

    pub fn draw_depth<D: RenderDevice>(
        &self,
        device: &mut D,
        light_space_model: Option<UniformLocation>,
        light_space: Mat4,
    ) -> u32 {
        device.set_uniform(
            light_space_model,
            UniformValue::Mat4(light_space * self.model_matrix()),
        );
        device.draw_indexed(self.geometry.handle(), self.index_count, 0);
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::recording::RecordingDevice;

    #[test]
    fn place_below_leaves_clearance() {
        let mut device = RecordingDevice::new(64, 64);
        let mut ground = GroundPlane::new(&mut device).unwrap();
        ground.place_below(-2.0);
        assert!((ground.height() - -2.001).abs() < 1e-6);
    }

    #[test]
    fn model_matrix_spans_the_extent() {
        let mut device = RecordingDevice::new(64, 64);
        let mut ground = GroundPlane::new(&mut device).unwrap();
        ground.set_height(-1.0);
        let corner = ground.model_matrix().transform_point3(Vec3::new(1.0, 0.0, -1.0));
        assert!(corner.abs_diff_eq(Vec3::new(GROUND_EXTENT, -1.0, -GROUND_EXTENT), 1e-3));
    }
}
