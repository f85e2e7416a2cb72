use glam::{Mat4, Vec3};

use super::Frustum;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    pub fn position(&self) -> Vec3 {
        self.eye
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or(Vec3::NEG_Z)
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_proj(&self.view_proj())
    }

    /// Same position and orientation, clipped to `[near, far]`.
    pub fn with_clip(&self, near: f32, far: f32) -> Self {
        Self { near, far, ..*self }
    }

    /// Linear distance of `point` along the view direction.
    pub fn view_depth(&self, point: Vec3) -> f32 {
        (point - self.eye).dot(self.forward())
    }

    /// World-space corners of the frustum, near plane first.
    pub fn frustum_corners(&self) -> [Vec3; 8] {
        let inverse = self.view_proj().inverse();
        let ndc = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, -1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
            Vec3::new(-1.0, 1.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
        ];
        ndc.map(|corner| inverse.project_point3(corner))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_proj_is_reasonable() {
        let cam = Camera::default();
        let vp = cam.view_proj();
        let inv = vp.inverse();
        let id = vp * inv;
        let eps = 1e-4;
        assert!(id.abs_diff_eq(Mat4::IDENTITY, eps));
    }

    #[test]
    fn frustum_corners_lie_on_clip_planes() {
        let cam = Camera {
            eye: Vec3::ZERO,
            target: Vec3::NEG_Z,
            ..Camera::default()
        };
        let corners = cam.frustum_corners();
        for near_corner in &corners[..4] {
            assert!((cam.view_depth(*near_corner) - cam.near).abs() < 1e-3);
        }
        for far_corner in &corners[4..] {
            assert!((cam.view_depth(*far_corner) - cam.far).abs() < 1e-1);
        }
    }

    #[test]
    fn with_clip_keeps_orientation() {
        let cam = Camera::default();
        let slice = cam.with_clip(5.0, 10.0);
        assert_eq!(slice.view(), cam.view());
        assert_eq!(slice.near, 5.0);
        assert_eq!(slice.far, 10.0);
    }
}
