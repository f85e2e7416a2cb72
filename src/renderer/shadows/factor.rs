//! CPU reference of the shadow factor computed by `shadow_factor.wgsl`,
//! together with the uniform block both sides read.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec3Swizzles, Vec4Swizzles};

use super::config::MAX_FILTER_SAMPLES;
use super::shadow::{Shadow, ShadowKind, POINT_FACE_COUNT};
use crate::scene::Camera;

pub const DISTANT_DENSITY_SCALE: f32 = 16.0;
/// Multiplied by `attenuation^4` for spot lights.
pub const SPOT_DENSITY_SCALE: f32 = 4.0;
/// World units of point kernel spread per unit of filter density at one
/// world unit from the light. Grows with `distance^4`.
pub const POINT_DENSITY_SCALE: f32 = 5.0e-5;

pub const DISTANT_DEPTH_BIAS: f32 = 0.0015;
pub const SPOT_DEPTH_BIAS: f32 = 0.0002;
pub const POINT_DEPTH_BIAS: f32 = 0.0001;

pub const POISSON_DISK: [Vec2; 16] = [
    Vec2::new(-0.942_016_24, -0.399_062_16),
    Vec2::new(0.945_586_09, -0.768_907_25),
    Vec2::new(-0.094_184_101, -0.929_388_7),
    Vec2::new(0.344_959_38, 0.293_877_6),
    Vec2::new(-0.915_885_81, 0.457_714_32),
    Vec2::new(-0.815_442_32, -0.879_124_64),
    Vec2::new(-0.382_775_43, 0.276_768_45),
    Vec2::new(0.974_843_98, 0.756_483_79),
    Vec2::new(0.443_233_25, -0.975_115_54),
    Vec2::new(0.537_429_81, -0.473_734_2),
    Vec2::new(-0.264_969_11, -0.418_930_23),
    Vec2::new(0.791_975_14, 0.190_901_88),
    Vec2::new(-0.241_888_4, 0.997_065_07),
    Vec2::new(-0.814_099_55, 0.914_375_9),
    Vec2::new(0.199_841_26, 0.786_413_67),
    Vec2::new(0.143_831_61, -0.141_007_9),
];

/// Offsets shared by every point shadow when filtering.
pub const POINT_KERNEL: [Vec3; 20] = [
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(1.0, -1.0, 0.0),
    Vec3::new(-1.0, -1.0, 0.0),
    Vec3::new(-1.0, 1.0, 0.0),
    Vec3::new(1.0, 0.0, 1.0),
    Vec3::new(-1.0, 0.0, 1.0),
    Vec3::new(1.0, 0.0, -1.0),
    Vec3::new(-1.0, 0.0, -1.0),
    Vec3::new(0.0, 1.0, 1.0),
    Vec3::new(0.0, -1.0, 1.0),
    Vec3::new(0.0, -1.0, -1.0),
    Vec3::new(0.0, 1.0, -1.0),
];

/// Shadow block as laid out in `shadow_factor.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ShadowUniform {
    pub view_proj: [[[f32; 4]; 4]; POINT_FACE_COUNT],
    /// Normalized cascade far distances.
    pub splits: [f32; 4],
    /// opacity, filter density, texel size, depth bias
    pub params: [f32; 4],
    /// shadow near, shadow far, camera near, camera far
    pub clip: [f32; 4],
    pub light_position: [f32; 4],
    /// kind, face count, filter samples, enabled
    pub meta: [u32; 4],
}

impl ShadowUniform {
    pub fn from_shadow(shadow: &Shadow, camera: &Camera) -> Self {
        let config = shadow.config();
        let kind = shadow.kind();

        let mut view_proj = [Mat4::IDENTITY.to_cols_array_2d(); POINT_FACE_COUNT];
        for (slot, face) in view_proj.iter_mut().zip(shadow.faces()) {
            *slot = face.camera.view_proj.to_cols_array_2d();
        }

        let splits = shadow
            .cascade_splits()
            .map(|s| s.normalized_padded())
            .unwrap_or([1.0; 4]);

        let filter_samples = match (config.filter_enabled, kind) {
            (false, _) => 0,
            (true, ShadowKind::Point) => POINT_KERNEL.len() as u32,
            (true, _) => config.filter_samples.min(MAX_FILTER_SAMPLES),
        };

        let bias = match kind {
            ShadowKind::Distant => DISTANT_DEPTH_BIAS,
            ShadowKind::Spot => SPOT_DEPTH_BIAS,
            ShadowKind::Point => POINT_DEPTH_BIAS,
        };

        Self {
            view_proj,
            splits,
            params: [
                config.opacity,
                config.filter_density,
                1.0 / config.resolution.max(1) as f32,
                bias,
            ],
            clip: [config.near, config.far, camera.near, camera.far],
            light_position: shadow.light_position().extend(1.0).to_array(),
            meta: [
                kind.index(),
                shadow.face_count() as u32,
                filter_samples,
                config.enabled as u32,
            ],
        }
    }

    fn kind(&self) -> ShadowKind {
        match self.meta[0] {
            0 => ShadowKind::Distant,
            1 => ShadowKind::Spot,
            _ => ShadowKind::Point,
        }
    }

    fn view_proj(&self, layer: usize) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_proj[layer.min(POINT_FACE_COUNT - 1)])
    }
}

/// Depth comparison against one layer of a shadow map.
pub trait DepthSampler {
    /// 1.0 when `reference` is not farther than the stored depth at `uv`,
    /// 0.0 otherwise. Filtering hardware may return values in between.
    fn compare(&self, layer: u32, uv: Vec2, reference: f32) -> f32;
}

impl<F> DepthSampler for F
where
    F: Fn(u32, Vec2, f32) -> f32,
{
    fn compare(&self, layer: u32, uv: Vec2, reference: f32) -> f32 {
        self(layer, uv, reference)
    }
}

/// Turns a raw occlusion average into the final factor. Fully lit stays 1;
/// fully occluded drops to `1 - min(opacity / attenuation, 1)`.
pub fn blend_shadow(factor: f32, opacity: f32, attenuation: f32) -> f32 {
    if attenuation <= 0.0 {
        return 1.0;
    }
    let strength = (opacity / attenuation).clamp(0.0, 1.0);
    factor + (1.0 - factor) * (1.0 - strength)
}

/// Index of the first cascade whose normalized far split is at least
/// `normalized_depth`. `None` past the last split.
pub fn select_cascade(normalized_splits: &[f32], normalized_depth: f32) -> Option<usize> {
    normalized_splits.iter().position(|&split| split >= normalized_depth)
}

/// Perspective depth in [0, 1] of a point `major` units along a face axis,
/// as written by a 90 degree face camera with the given clip range.
pub fn point_pseudo_depth(major: f32, near: f32, far: f32) -> f32 {
    let depth = (far + near) / (far - near) - 2.0 * far * near / (far - near) / major;
    depth * 0.5 + 0.5
}

/// World-space length the point kernel offsets are scaled by.
pub fn point_spread(filter_density: f32, distance: f32) -> f32 {
    filter_density * POINT_DENSITY_SCALE * distance.powi(4)
}

/// Layer of the point-light face that sees direction `v`.
pub fn point_face(v: Vec3) -> usize {
    let a = v.abs();
    if a.x >= a.y && a.x >= a.z {
        if v.x > 0.0 {
            0
        } else {
            1
        }
    } else if a.y >= a.z {
        if v.y > 0.0 {
            2
        } else {
            3
        }
    } else if v.z > 0.0 {
        4
    } else {
        5
    }
}

fn ndc_to_uv(ndc: Vec2) -> Vec2 {
    Vec2::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5)
}

fn sample_layer<S: DepthSampler + ?Sized>(
    sampler: &S,
    layer: usize,
    uv: Vec2,
    reference: f32,
) -> f32 {
    if uv.cmplt(Vec2::ZERO).any() || uv.cmpgt(Vec2::ONE).any() {
        return 1.0;
    }
    sampler.compare(layer as u32, uv, reference)
}

/// Evaluates the shadow factor of one fragment the way the lighting pass
/// does.
#[derive(Clone, Copy, Debug)]
pub struct ShadowFactorModel {
    uniform: ShadowUniform,
}

impl ShadowFactorModel {
    pub fn new(uniform: ShadowUniform) -> Self {
        Self { uniform }
    }

    pub fn uniform(&self) -> &ShadowUniform {
        &self.uniform
    }

    /// `view_depth` is the fragment's linear depth in the main camera,
    /// `attenuation` the light's falloff at the fragment.
    pub fn factor<S: DepthSampler + ?Sized>(
        &self,
        sampler: &S,
        world_position: Vec3,
        view_depth: f32,
        attenuation: f32,
    ) -> f32 {
        if self.uniform.meta[3] == 0 {
            return 1.0;
        }
        let raw = match self.uniform.kind() {
            ShadowKind::Distant => {
                let count = (self.uniform.meta[1] as usize).min(4);
                let depth = view_depth / self.uniform.clip[3];
                match select_cascade(&self.uniform.splits[..count], depth) {
                    Some(cascade) => {
                        self.directional(sampler, cascade, world_position, DISTANT_DENSITY_SCALE)
                    }
                    None => return 1.0,
                }
            }
            ShadowKind::Spot => {
                let scale = SPOT_DENSITY_SCALE * attenuation.powi(4);
                self.directional(sampler, 0, world_position, scale)
            }
            ShadowKind::Point => self.point(sampler, world_position),
        };
        blend_shadow(raw, self.uniform.params[0], attenuation)
    }

    /// Average of the centre sample and the Poisson-disk samples on one
    /// layer.
    pub fn directional<S: DepthSampler + ?Sized>(
        &self,
        sampler: &S,
        layer: usize,
        world_position: Vec3,
        density_scale: f32,
    ) -> f32 {
        let clip = self.uniform.view_proj(layer) * world_position.extend(1.0);
        if clip.w <= 0.0 {
            return 1.0;
        }
        let ndc = clip.xyz() / clip.w;
        let uv = ndc_to_uv(ndc.xy());
        let reference = ndc.z - self.uniform.params[3];

        let samples = (self.uniform.meta[2] as usize).min(POISSON_DISK.len());
        let spread = self.uniform.params[1] * density_scale * self.uniform.params[2];
        let total = POISSON_DISK[..samples]
            .iter()
            .fold(sample_layer(sampler, layer, uv, reference), |acc, offset| {
                acc + sample_layer(sampler, layer, uv + *offset * spread, reference)
            });
        total / (samples + 1) as f32
    }

    pub fn point<S: DepthSampler + ?Sized>(&self, sampler: &S, world_position: Vec3) -> f32 {
        let light = Vec3::from_slice(&self.uniform.light_position[..3]);
        let to_fragment = world_position - light;
        let centre = self.point_sample(sampler, light, to_fragment);
        if self.uniform.meta[2] == 0 {
            return centre;
        }

        let spread = point_spread(self.uniform.params[1], to_fragment.length());
        let total = POINT_KERNEL.iter().fold(centre, |acc, direction| {
            acc + self.point_sample(sampler, light, to_fragment + *direction * spread)
        });
        total / (POINT_KERNEL.len() + 1) as f32
    }

    fn point_sample<S: DepthSampler + ?Sized>(
        &self,
        sampler: &S,
        light: Vec3,
        to_fragment: Vec3,
    ) -> f32 {
        let major = to_fragment.abs().max_element();
        if major <= f32::EPSILON {
            return 1.0;
        }
        let (near, far) = (self.uniform.clip[0], self.uniform.clip[1]);
        let reference = point_pseudo_depth(major, near, far) - POINT_DEPTH_BIAS;

        let face = point_face(to_fragment);
        let clip = self.uniform.view_proj(face) * (light + to_fragment).extend(1.0);
        let uv = ndc_to_uv(clip.xy() / clip.w);
        sample_layer(sampler, face, uv, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::shadows::ShadowConfig;
    use crate::scene::{Light, Transform};

    #[test]
    fn uniform_matches_shader_block_size() {
        assert_eq!(std::mem::size_of::<ShadowUniform>(), 464);
        assert_eq!(std::mem::size_of::<ShadowUniform>() % 16, 0);
    }

    #[test]
    fn blend_boundaries() {
        assert_eq!(blend_shadow(1.0, 1.0, 1.0), 1.0);
        assert_eq!(blend_shadow(0.0, 1.0, 1.0), 0.0);
        assert_eq!(blend_shadow(0.0, 0.5, 1.0), 0.5);
        // weak light cannot darken beyond full occlusion
        assert_eq!(blend_shadow(0.0, 1.0, 0.25), 0.0);
        assert_eq!(blend_shadow(0.0, 1.0, 0.0), 1.0);
    }

    #[test]
    fn point_faces_follow_major_axis() {
        assert_eq!(point_face(Vec3::new(3.0, 1.0, -2.0)), 0);
        assert_eq!(point_face(Vec3::new(-3.0, 1.0, -2.0)), 1);
        assert_eq!(point_face(Vec3::new(0.0, 5.0, 1.0)), 2);
        assert_eq!(point_face(Vec3::new(0.0, -5.0, 1.0)), 3);
        assert_eq!(point_face(Vec3::new(0.1, 0.2, 1.0)), 4);
        assert_eq!(point_face(Vec3::new(0.1, 0.2, -1.0)), 5);
    }

    #[test]
    fn uniform_packs_spot_shadow() {
        let light = Light::spot(Vec3::ONE, 1.0, 0.2, 0.4, 20.0);
        let config = ShadowConfig {
            filter_enabled: false,
            opacity: 0.7,
            ..ShadowConfig::for_kind(ShadowKind::Spot)
        };
        let mut shadow = Shadow::new(ShadowKind::Spot, config);
        let camera = Camera::default();
        shadow.prepare(&light, &Transform::from_translation(Vec3::Y), &camera, true);

        let uniform = ShadowUniform::from_shadow(&shadow, &camera);
        assert_eq!(uniform.meta, [1, 1, 0, 1]);
        assert_eq!(uniform.params[0], 0.7);
        assert_eq!(uniform.light_position, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(
            Mat4::from_cols_array_2d(&uniform.view_proj[0]),
            shadow.faces()[0].camera.view_proj
        );
    }
}
