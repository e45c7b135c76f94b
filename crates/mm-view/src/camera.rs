use glam::{Mat4, Vec3};

/// Orbit camera: a target point plus spherical eye coordinates. Drag
/// rotates, scroll zooms, and loading a mesh re-frames it around the bounds.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub aspect_ratio: f32,
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        // Default pose: eye at (0, 1, 5) looking at the origin.
        let distance = (1.0f32 + 25.0).sqrt();
        Self {
            target: Vec3::ZERO,
            distance,
            yaw: 0.0,
            pitch: (1.0 / distance).asin(),
            aspect_ratio: 1.0,
            fov_y_deg: 75.0,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }
}

impl OrbitCamera {
    const MIN_DISTANCE: f32 = 0.05;
    const MAX_DISTANCE: f32 = 500.0;
    // Keep the eye off the poles so look_at stays well-defined.
    const MAX_PITCH: f32 = 1.54;

    pub fn eye(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        self.target
            + self.distance * Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    pub fn rotate(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw -= d_yaw;
        self.pitch = (self.pitch + d_pitch).clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
    }

    /// Multiplicative zoom; positive moves the eye closer.
    pub fn zoom(&mut self, amount: f32) {
        self.distance =
            (self.distance * (1.0 - amount)).clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE);
    }

    /// Re-frame around a mesh: look at its center from 2.5x its largest
    /// dimension, keeping the current orbit angles.
    pub fn frame_bounds(&mut self, center: Vec3, max_dimension: f32) {
        self.target = center;
        self.distance =
            (max_dimension * 2.5).clamp(Self::MIN_DISTANCE, Self::MAX_DISTANCE);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            self.aspect_ratio.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pose() {
        let camera = OrbitCamera::default();
        let eye = camera.eye();
        assert!((eye.x - 0.0).abs() < 1e-4);
        assert!((eye.y - 1.0).abs() < 1e-4);
        assert!((eye.z - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_zoom_clamps() {
        let mut camera = OrbitCamera::default();
        for _ in 0..200 {
            camera.zoom(0.5);
        }
        assert!(camera.distance >= 0.05);
        for _ in 0..200 {
            camera.zoom(-0.5);
        }
        assert!(camera.distance <= 500.0);
    }

    #[test]
    fn test_pitch_clamps() {
        let mut camera = OrbitCamera::default();
        camera.rotate(0.0, 10.0);
        assert!(camera.pitch <= 1.54);
        camera.rotate(0.0, -20.0);
        assert!(camera.pitch >= -1.54);
    }

    #[test]
    fn test_frame_bounds() {
        let mut camera = OrbitCamera::default();
        camera.frame_bounds(Vec3::new(1.0, 2.0, 3.0), 4.0);
        assert_eq!(camera.target, Vec3::new(1.0, 2.0, 3.0));
        assert!((camera.distance - 10.0).abs() < 1e-5);
    }
}
