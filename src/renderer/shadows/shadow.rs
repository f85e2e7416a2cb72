use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};
use hecs::Entity;

use super::cascade::{fit_light_to_slice, CascadeComputer, CascadeSplits};
use super::config::{ShadowConfig, ShadowDirty};
use crate::renderer::backend::DepthTargetId;
use crate::scene::{Aabb, Camera, Frustum, Light, Transform};

pub const POINT_FACE_COUNT: usize = 6;

/// Look direction and up vector of the six point-light faces, in layer
/// order +X, -X, +Y, -Y, +Z, -Z.
pub const POINT_FACE_BASES: [(Vec3, Vec3); POINT_FACE_COUNT] = [
    (Vec3::X, Vec3::Y),
    (Vec3::NEG_X, Vec3::Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y),
];

const MIN_SPOT_FOV: f32 = 1.0e-2;
const MAX_SPOT_FOV: f32 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShadowKind {
    /// Cascaded orthographic maps following the main camera.
    Distant,
    /// One perspective map along the cone.
    Spot,
    /// Six 90 degree perspective maps around the light.
    Point,
}

impl ShadowKind {
    pub fn face_count(self, config: &ShadowConfig) -> usize {
        match self {
            ShadowKind::Distant => config.num_cascades as usize,
            ShadowKind::Spot => 1,
            ShadowKind::Point => POINT_FACE_COUNT,
        }
    }

    pub fn is_omnidirectional(self) -> bool {
        matches!(self, ShadowKind::Point)
    }

    pub fn index(self) -> u32 {
        match self {
            ShadowKind::Distant => 0,
            ShadowKind::Spot => 1,
            ShadowKind::Point => 2,
        }
    }

    /// Changes after which the face cameras must be refitted.
    fn projection_inputs(self) -> ShadowDirty {
        match self {
            ShadowKind::Distant => {
                ShadowDirty::CAMERA
                    | ShadowDirty::LIGHT
                    | ShadowDirty::CASCADE_COUNT
                    | ShadowDirty::CASCADE_WEIGHT
                    | ShadowDirty::RESOLUTION
            }
            ShadowKind::Spot | ShadowKind::Point => ShadowDirty::LIGHT | ShadowDirty::CLIP,
        }
    }
}

/// Camera a single shadow face renders from.
#[derive(Clone, Copy, Debug)]
pub struct SubCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_proj: Mat4,
    pub frustum: Frustum,
    pub near: f32,
    pub far: f32,
    /// For cascades: the main camera clipped to this cascade's range.
    pub slice: Option<Camera>,
}

impl SubCamera {
    pub fn new(view: Mat4, projection: Mat4, near: f32, far: f32) -> Self {
        let view_proj = projection * view;
        Self {
            view,
            projection,
            view_proj,
            frustum: Frustum::from_view_proj(&view_proj),
            near,
            far,
            slice: None,
        }
    }

    pub fn intersects(&self, bounds: &Aabb) -> bool {
        self.frustum.intersects_aabb(bounds)
    }
}

impl Default for SubCamera {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, 0.0, 1.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ShadowFace {
    pub camera: SubCamera,
    /// Casters seen by this face, rebuilt every frame.
    pub casters: Vec<Entity>,
}

/// Shadow state owned by a light entity.
#[derive(Debug)]
pub struct Shadow {
    kind: ShadowKind,
    config: ShadowConfig,
    applied: Option<ShadowConfig>,
    faces: Vec<ShadowFace>,
    cascades: CascadeComputer,
    light_matrix: Option<Mat4>,
    light_position: Vec3,
    dirty: ShadowDirty,
    pub(crate) map: Option<DepthTargetId>,
}

impl Shadow {
    pub fn new(kind: ShadowKind, config: ShadowConfig) -> Self {
        Self {
            kind,
            config: config.validated(),
            applied: None,
            faces: Vec::new(),
            cascades: CascadeComputer::new(),
            light_matrix: None,
            light_position: Vec3::ZERO,
            dirty: ShadowDirty::all(),
            map: None,
        }
    }

    pub fn kind(&self) -> ShadowKind {
        self.kind
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Replaces the configuration. Out-of-range values are clamped; the
    /// change is picked up by the next `prepare`.
    pub fn set_config(&mut self, config: ShadowConfig) {
        self.config = config.validated();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn faces(&self) -> &[ShadowFace] {
        &self.faces
    }

    pub(crate) fn faces_mut(&mut self) -> &mut [ShadowFace] {
        &mut self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// What changed in the most recent `prepare`.
    pub fn dirty(&self) -> ShadowDirty {
        self.dirty
    }

    pub fn cascade_splits(&self) -> Option<&CascadeSplits> {
        match self.kind {
            ShadowKind::Distant => self.cascades.splits(),
            _ => None,
        }
    }

    pub fn light_position(&self) -> Vec3 {
        self.light_position
    }

    pub fn map(&self) -> Option<DepthTargetId> {
        self.map
    }

    pub fn caster_count(&self) -> usize {
        self.faces.iter().map(|f| f.casters.len()).sum()
    }

    pub(crate) fn clear_casters(&mut self) {
        for face in &mut self.faces {
            face.casters.clear();
        }
    }

    /// Brings faces and their cameras up to date for this frame.
    ///
    /// Face cameras are refitted only when an input they depend on changed.
    /// A degenerate light basis keeps the previous cameras.
    pub fn prepare(
        &mut self,
        light: &Light,
        light_world: &Transform,
        camera: &Camera,
        camera_changed: bool,
    ) -> ShadowDirty {
        let mut dirty = match &self.applied {
            Some(previous) => self.config.diff(previous),
            None => ShadowDirty::all(),
        };
        if camera_changed {
            dirty |= ShadowDirty::CAMERA;
        }
        let light_matrix = light_world.matrix();
        if self.light_matrix != Some(light_matrix) {
            dirty |= ShadowDirty::LIGHT;
        }
        self.applied = Some(self.config);
        self.light_matrix = Some(light_matrix);
        self.light_position = light_world.translation;

        let face_count = self.kind.face_count(&self.config);
        let resized = self.faces.len() != face_count;
        if resized {
            self.faces.resize_with(face_count, ShadowFace::default);
        }

        if resized || dirty.intersects(self.kind.projection_inputs()) {
            match self.kind {
                ShadowKind::Distant => self.fit_cascades(light_world, camera),
                ShadowKind::Spot => self.fit_spot(light, light_world),
                ShadowKind::Point => self.fit_point(light_world),
            }
        }

        self.dirty = dirty;
        dirty
    }

    fn fit_cascades(&mut self, light_world: &Transform, camera: &Camera) {
        let config = self.config;
        self.cascades
            .update(camera.near, camera.far, config.num_cascades, config.cascade_weight);
        let Some(splits) = self.cascades.splits().copied() else {
            return;
        };
        let direction = light_world.forward();
        let up = light_world.rotation * Vec3::Y;

        for (index, face) in self.faces.iter_mut().enumerate() {
            let (near, far) = splits.range(index);
            let slice = camera.with_clip(near, far);
            match fit_light_to_slice(&slice.frustum_corners(), direction, up, config.resolution) {
                Some(fit) => {
                    face.camera = SubCamera::new(fit.view, fit.projection, 0.0, fit.radius * 4.0);
                    face.camera.slice = Some(slice);
                }
                None => {
                    log::trace!("Degenerate light basis for cascade {}, keeping previous", index)
                }
            }
        }
    }

    fn fit_spot(&mut self, light: &Light, light_world: &Transform) {
        let up = light_world.rotation * Vec3::Y;
        let Some(view) = light_view(light_world.translation, light_world.forward(), up) else {
            log::trace!("Degenerate spot light basis, keeping previous camera");
            return;
        };
        let fov = light
            .cone_angle()
            .map(|angle| (angle * 2.0).clamp(MIN_SPOT_FOV, MAX_SPOT_FOV))
            .unwrap_or(FRAC_PI_2);
        let projection = Mat4::perspective_rh(fov, 1.0, self.config.near, self.config.far);
        if let Some(face) = self.faces.first_mut() {
            face.camera = SubCamera::new(view, projection, self.config.near, self.config.far);
        }
    }

    fn fit_point(&mut self, light_world: &Transform) {
        let projection = Mat4::perspective_rh(FRAC_PI_2, 1.0, self.config.near, self.config.far);
        let position = light_world.translation;
        for (face, (direction, up)) in self.faces.iter_mut().zip(POINT_FACE_BASES) {
            if let Some(view) = light_view(position, direction, up) {
                face.camera = SubCamera::new(view, projection, self.config.near, self.config.far);
            }
        }
    }
}

fn light_view(position: Vec3, direction: Vec3, up: Vec3) -> Option<Mat4> {
    let direction = direction.try_normalize()?;
    let up = up.try_normalize()?;
    if !position.is_finite() || direction.cross(up).length_squared() < 1.0e-8 {
        return None;
    }
    Some(Mat4::look_at_rh(position, position + direction, up))
}
