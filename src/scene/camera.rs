use glam::{Mat4, Vec3};

pub const MOUSE_SENSITIVITY: f32 = 0.2;
pub const PITCH_LIMIT_DEGREES: f32 = 89.0;
pub const ZOOM_STEP: f32 = 0.5;
pub const MIN_DISTANCE: f32 = 1.0;
pub const MAX_DISTANCE: f32 = 20.0;

/// Orbit camera circling `target` at `distance`, angles in degrees.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    yaw: f32,
    pitch: f32,
    distance: f32,
    eye: Vec3,
}

impl Camera {
    pub fn new(target: Vec3, yaw: f32, pitch: f32, distance: f32) -> Self {
        let mut camera = Self {
            target,
            up: Vec3::Y,
            fov_y_radians: 45f32.to_radians(),
            near: 0.1,
            far: 100.0,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES),
            distance: distance.clamp(MIN_DISTANCE, MAX_DISTANCE),
            eye: Vec3::ZERO,
        };
        camera.update_eye();
        camera
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far)
    }

    pub fn position(&self) -> Vec3 {
        self.eye
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Mouse drag in pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * MOUSE_SENSITIVITY;
        self.pitch = (self.pitch - dy * MOUSE_SENSITIVITY)
            .clamp(-PITCH_LIMIT_DEGREES, PITCH_LIMIT_DEGREES);
        self.update_eye();
    }

    /// Scroll wheel steps; positive moves closer.
    pub fn zoom(&mut self, steps: f32) {
        self.distance = (self.distance - steps * ZOOM_STEP).clamp(MIN_DISTANCE, MAX_DISTANCE);
        self.update_eye();
    }

    fn update_eye(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        let front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
        self.eye = self.target - front.normalize() * self.distance;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, -25.0, -25.0, 5.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_proj_is_invertible() {
        let cam = Camera::default();
        let vp = cam.projection(4.0 / 3.0) * cam.view_matrix();
        let id = vp * vp.inverse();
        assert!(id.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn eye_stays_at_distance_from_target() {
        let mut cam = Camera::default();
        cam.orbit(120.0, -40.0);
        assert!((cam.position().distance(cam.target) - 5.0).abs() < 1e-4);
        // Negative pitch looks down, so the eye is above the target.
        assert!(Camera::default().position().y > 0.0);
    }

    #[test]
    fn pitch_and_distance_are_clamped() {
        let mut cam = Camera::default();
        cam.orbit(0.0, -10_000.0);
        assert_eq!(cam.pitch(), PITCH_LIMIT_DEGREES);
        cam.zoom(100.0);
        assert_eq!(cam.distance(), MIN_DISTANCE);
        cam.zoom(-100.0);
        assert_eq!(cam.distance(), MAX_DISTANCE);
    }
}
