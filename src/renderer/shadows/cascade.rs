//! Cascade splits and light-space fitting for distant lights.

use glam::{Mat4, Vec3, Vec4};

use super::config::{MAX_CASCADES, MIN_CASCADES, MIN_NEAR};

/// Far distances of each cascade, plus the same values divided by the main
/// camera's far plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeSplits {
    count: usize,
    near: f32,
    far: [f32; MAX_CASCADES as usize],
    normalized: [f32; MAX_CASCADES as usize],
}

impl CascadeSplits {
    pub fn count(&self) -> usize {
        self.count
    }

    /// Far distance of every active cascade.
    pub fn far(&self) -> &[f32] {
        &self.far[..self.count]
    }

    /// Far distances divided by the camera far plane, for cascade selection.
    pub fn normalized(&self) -> &[f32] {
        &self.normalized[..self.count]
    }

    /// `[near, far]` slice of cascade `index`. The first cascade starts at
    /// the camera near plane, every other one where its predecessor ends.
    pub fn range(&self, index: usize) -> (f32, f32) {
        let near = if index == 0 {
            self.near
        } else {
            self.far[index - 1]
        };
        (near, self.far[index])
    }

    /// Normalized splits padded to four lanes with the last split.
    pub fn normalized_padded(&self) -> [f32; 4] {
        let last = self.normalized[self.count.saturating_sub(1)];
        std::array::from_fn(|i| if i < self.count { self.normalized[i] } else { last })
    }
}

/// Blends a uniform and a logarithmic split scheme: `weight = 1` is fully
/// uniform, `weight = 0` fully logarithmic. `count` is clamped into the
/// supported cascade range and `near` raised to a small positive distance.
pub fn compute_cascade_splits(near: f32, far: f32, count: u32, weight: f32) -> CascadeSplits {
    let near = near.max(MIN_NEAR);
    let far = far.max(near + MIN_NEAR);
    let count = count.clamp(MIN_CASCADES, MAX_CASCADES) as usize;
    let weight = weight.clamp(0.0, 1.0);

    let mut splits = CascadeSplits {
        count,
        near,
        far: [far; MAX_CASCADES as usize],
        normalized: [1.0; MAX_CASCADES as usize],
    };

    for i in 0..count {
        // Last split lands exactly on the camera far plane.
        let split = if i + 1 == count {
            far
        } else {
            let p = (i + 1) as f32 / count as f32;
            let uniform = near + (far - near) * p;
            let logarithmic = near * (far / near).powf(p);
            weight * uniform + (1.0 - weight) * logarithmic
        };
        splits.far[i] = split;
        splits.normalized[i] = split / far;
    }

    splits
}

/// Caches cascade splits and recomputes them only when an input changes.
#[derive(Clone, Debug, Default)]
pub struct CascadeComputer {
    inputs: Option<(f32, f32, u32, f32)>,
    splits: Option<CascadeSplits>,
}

impl CascadeComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the splits were recomputed.
    pub fn update(&mut self, near: f32, far: f32, count: u32, weight: f32) -> bool {
        let inputs = (near, far, count, weight);
        if self.inputs == Some(inputs) && self.splits.is_some() {
            return false;
        }
        self.inputs = Some(inputs);
        self.splits = Some(compute_cascade_splits(near, far, count, weight));
        log::trace!("Cascade splits recomputed: {:?}", self.splits);
        true
    }

    pub fn splits(&self) -> Option<&CascadeSplits> {
        self.splits.as_ref()
    }
}

/// Orthographic light-space fit of a frustum slice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightFit {
    pub view: Mat4,
    pub projection: Mat4,
    pub radius: f32,
    /// World-space size of one shadow-map texel.
    pub texel_size: f32,
}

/// Fits an orthographic light camera around the bounding sphere of
/// `corners`, looking along `direction` with the given `up`.
///
/// The light sits `2r` behind the sphere centre and sees depths `[0, 4r]`.
/// The projection is shifted so the world origin lands on a texel centre,
/// which keeps edges from crawling while the camera moves. Returns `None`
/// for a degenerate basis or slice.
pub fn fit_light_to_slice(
    corners: &[Vec3; 8],
    direction: Vec3,
    up: Vec3,
    resolution: u32,
) -> Option<LightFit> {
    let direction = direction.try_normalize()?;
    let up = up.try_normalize()?;
    if direction.cross(up).length_squared() < 1.0e-8 {
        return None;
    }

    let center = corners.iter().copied().sum::<Vec3>() / 8.0;
    let radius = corners
        .iter()
        .map(|c| c.distance(center))
        .fold(0.0f32, f32::max);
    if !radius.is_finite() || radius <= f32::EPSILON {
        return None;
    }

    let eye = center - direction * radius * 2.0;
    let view = Mat4::look_at_rh(eye, center, up);
    let mut projection = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, radius * 4.0);

    let half_resolution = resolution.max(1) as f32 * 0.5;
    let origin = (projection * view) * Vec4::W;
    let texel = origin.truncate().truncate() * half_resolution;
    let offset = (texel.round() - texel) / half_resolution;
    projection.w_axis.x += offset.x;
    projection.w_axis.y += offset.y;

    Some(LightFit {
        view,
        projection,
        radius,
        texel_size: radius * 2.0 / resolution.max(1) as f32,
    })
}
