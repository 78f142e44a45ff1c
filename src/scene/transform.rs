use glam::{Mat4, Vec3};

/// Model placement with rotation expressed as degrees around an axis, the
/// form the renderer drives auto-rotation through.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelTransform {
    pub position: Vec3,
    pub rotation_degrees: f32,
    pub rotation_axis: Vec3,
    pub scale: Vec3,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation_degrees: 0.0,
            rotation_axis: Vec3::Y,
            scale: Vec3::ONE,
        }
    }
}

impl ModelTransform {
    /// `translate * rotate * scale`.
    pub fn matrix(&self) -> Mat4 {
        let axis = self.rotation_axis.normalize_or_zero();
        let rotation = if axis == Vec3::ZERO {
            Mat4::IDENTITY
        } else {
            Mat4::from_axis_angle(axis, self.rotation_degrees.to_radians())
        };
        Mat4::from_translation(self.position) * rotation * Mat4::from_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        let m = ModelTransform::default().matrix();
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn scale_rotate_then_translate() {
        let transform = ModelTransform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation_degrees: 90.0,
            rotation_axis: Vec3::Y,
            scale: Vec3::splat(2.0),
        };
        // (1,0,0) -> (2,0,0) -> (0,0,-2) -> (1,2,1)
        let p = transform.matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 1.0), 1e-5));
    }

    #[test]
    fn zero_axis_means_no_rotation() {
        let transform = ModelTransform {
            rotation_degrees: 45.0,
            rotation_axis: Vec3::ZERO,
            ..ModelTransform::default()
        };
        assert!(transform.matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
