use glam::{Mat3, Mat4, Quat, Vec3};

/// Determinant magnitude below which a basis is treated as singular.
const SINGULAR_EPSILON: f32 = 1e-8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_trs(t: Vec3, r: Quat, s: Vec3) -> Self {
        Self {
            translation: t,
            rotation: r,
            scale: s,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Transform looking from `eye` towards `target`; the local -Z axis is
    /// the forward direction.
    pub fn looking_at(eye: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - eye).normalize_or(Vec3::NEG_Z);
        let up = if forward.cross(up).length_squared() < 1e-8 {
            if forward.dot(Vec3::X).abs() < 0.9 {
                Vec3::X
            } else {
                Vec3::Z
            }
        } else {
            up
        };
        let rotation = Quat::from_mat4(&Mat4::look_to_rh(eye, forward, up).inverse());
        Self {
            translation: eye,
            rotation: rotation.normalize(),
            scale: Vec3::ONE,
        }
    }

    /// Parent-to-child composition: `self` is the parent's world transform.
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.translation + self.rotation * (self.scale * child.translation),
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Inverse-transpose of the linear part, or `None` when the transform
    /// collapses an axis.
    pub fn normal_matrix(&self) -> Option<Mat3> {
        let linear = Mat3::from_mat4(self.matrix());
        let det = linear.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
            return None;
        }
        Some(linear.inverse().transpose())
    }
}
