use std::collections::BTreeMap;
use std::fmt;

use hecs::{Entity, World};

use super::programs::ShadowPrograms;
use super::shadow::{Shadow, ShadowKind};
use crate::asset::Assets;
use crate::renderer::backend::{DepthTargetDescriptor, DepthTargetId, ShadowBackend};
use crate::renderer::program::VariantSelector;
use crate::scene::components::{MeshComponent, WorldTransform};

/// Counters for one frame of shadow work.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowFrameStats {
    pub shadows: u32,
    pub disabled: u32,
    pub faces_drawn: u32,
    pub faces_cleared: u32,
    pub casters: u32,
    pub draws: u32,
    pub geometry_built: u32,
    pub geometry_updated: u32,
    pub variant_switches: u32,
    pub targets_created: u32,
    pub targets_released: u32,
}

impl fmt::Display for ShadowFrameStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shadows ({} disabled), {} faces drawn, {} cleared, {} casters, {} draws, \
             {} built, {} updated, {} variant switches, {} targets created, {} released",
            self.shadows,
            self.disabled,
            self.faces_drawn,
            self.faces_cleared,
            self.casters,
            self.draws,
            self.geometry_built,
            self.geometry_updated,
            self.variant_switches,
            self.targets_created,
            self.targets_released
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct TargetInfo {
    owner: Entity,
    size: u32,
    layers: u32,
}

/// Draws caster lists into shadow maps through a [`ShadowBackend`].
pub struct ShadowMapRenderer {
    programs: ShadowPrograms,
    selector: VariantSelector,
    targets: BTreeMap<DepthTargetId, TargetInfo>,
}

impl ShadowMapRenderer {
    pub fn new(programs: ShadowPrograms) -> Self {
        Self {
            programs,
            selector: VariantSelector::new(),
            targets: BTreeMap::new(),
        }
    }

    pub fn programs(&self) -> &ShadowPrograms {
        &self.programs
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// Renders one shadow. A disabled shadow has its map and caster lists
    /// cleared instead.
    pub fn render<B: ShadowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        world: &World,
        assets: &mut Assets,
        light: Entity,
        shadow: &mut Shadow,
        stats: &mut ShadowFrameStats,
    ) {
        stats.shadows += 1;

        if !shadow.is_enabled() {
            stats.disabled += 1;
            if let Some(target) = shadow.map {
                backend.clear_depth_target(target, None);
                stats.faces_cleared += shadow.face_count() as u32;
            }
            shadow.clear_casters();
            return;
        }

        let target = self.ensure_target(backend, light, shadow, stats);

        let variant = self.programs.variant_for(shadow.kind().is_omnidirectional());
        if self.selector.select(backend, variant) {
            stats.variant_switches += 1;
        }

        for (layer, face) in shadow.faces().iter().enumerate() {
            let layer = layer as u32;
            backend.clear_depth_target(target, Some(layer));
            if face.casters.is_empty() {
                stats.faces_cleared += 1;
                continue;
            }

            backend.bind_depth_target(target, layer);
            stats.faces_drawn += 1;
            stats.casters += face.casters.len() as u32;

            for &caster in &face.casters {
                let Ok(mesh) = world.get::<&MeshComponent>(caster).map(|m| m.0) else {
                    continue;
                };
                let Some(data) = assets.meshes.get_mut(mesh) else {
                    log::warn!("Caster {:?} references missing mesh {:?}", caster, mesh);
                    continue;
                };

                if !backend.is_geometry_resident(mesh) {
                    backend.build_geometry(mesh, data);
                    data.mark_clean();
                    stats.geometry_built += 1;
                } else if data.is_dirty() {
                    backend.update_geometry(mesh, data);
                    data.mark_clean();
                    stats.geometry_updated += 1;
                }

                let model = world
                    .get::<&WorldTransform>(caster)
                    .map(|t| t.0.matrix())
                    .unwrap_or_default();
                backend.draw_depth(mesh, face.camera.view_proj * model);
                stats.draws += 1;
            }
        }
    }

    /// Creates the shadow's depth target on first use and recreates it when
    /// the resolution or face count changed.
    fn ensure_target<B: ShadowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        light: Entity,
        shadow: &mut Shadow,
        stats: &mut ShadowFrameStats,
    ) -> DepthTargetId {
        let size = shadow.config().resolution;
        let layers = shadow.face_count().max(1) as u32;

        if let Some(target) = shadow.map {
            match self.targets.get(&target) {
                Some(info) if info.size == size && info.layers == layers => return target,
                _ => {
                    log::debug!(
                        "Rebuilding shadow map of {:?} at {}px x {} layers",
                        light,
                        size,
                        layers
                    );
                    self.release(backend, target, stats);
                }
            }
        }

        let label = match shadow.kind() {
            ShadowKind::Distant => "DistantShadowMap",
            ShadowKind::Spot => "SpotShadowMap",
            ShadowKind::Point => "PointShadowMap",
        };
        let target = backend.create_depth_target(&DepthTargetDescriptor {
            label: format!("{label}{}", light.id()),
            size,
            layers,
        });
        log::info!(
            "Created {} for light {:?}: {}px x {} layers",
            label,
            light,
            size,
            layers
        );
        self.targets.insert(
            target,
            TargetInfo {
                owner: light,
                size,
                layers,
            },
        );
        shadow.map = Some(target);
        stats.targets_created += 1;
        target
    }

    fn release<B: ShadowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        target: DepthTargetId,
        stats: &mut ShadowFrameStats,
    ) {
        self.targets.remove(&target);
        backend.destroy_depth_target(target);
        stats.targets_released += 1;
    }

    /// Destroys targets whose owning light no longer carries the shadow
    /// that uses them.
    pub fn release_orphans<B: ShadowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        world: &World,
        stats: &mut ShadowFrameStats,
    ) {
        let orphans: Vec<DepthTargetId> = self
            .targets
            .iter()
            .filter(|(target, info)| match world.get::<&Shadow>(info.owner) {
                Ok(shadow) => shadow.map != Some(**target),
                Err(_) => true,
            })
            .map(|(target, _)| *target)
            .collect();

        for target in orphans {
            log::debug!("Releasing orphaned shadow map {:?}", target);
            self.release(backend, target, stats);
        }
    }

    /// Destroys every target this renderer created.
    pub fn release_all<B: ShadowBackend + ?Sized>(&mut self, backend: &mut B) {
        let mut stats = ShadowFrameStats::default();
        let targets: Vec<DepthTargetId> = self.targets.keys().copied().collect();
        for target in targets {
            self.release(backend, target, &mut stats);
        }
        self.selector.invalidate();
    }
}
