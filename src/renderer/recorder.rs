use std::collections::{HashMap, HashSet};

use glam::Mat4;

use crate::asset::{Handle, MeshData};
use crate::renderer::backend::{DepthTargetDescriptor, DepthTargetId, ShadowBackend};
use crate::renderer::program::VariantId;

#[derive(Clone, Debug, PartialEq)]
pub enum ShadowCommand {
    CreateTarget {
        target: DepthTargetId,
        size: u32,
        layers: u32,
    },
    DestroyTarget(DepthTargetId),
    Clear {
        target: DepthTargetId,
        layer: Option<u32>,
    },
    Bind {
        target: DepthTargetId,
        layer: u32,
    },
    WriteVariant(VariantId),
    BuildGeometry(Handle<MeshData>),
    UpdateGeometry(Handle<MeshData>),
    Draw {
        mesh: Handle<MeshData>,
        mvp: Mat4,
    },
}

/// What a recorded depth layer holds at the moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerContents {
    /// Never cleared or drawn since creation.
    Undefined,
    Cleared,
    /// Number of depth draws since the last clear.
    Drawn(u32),
}

#[derive(Debug)]
struct RecordedTarget {
    size: u32,
    layers: Vec<LayerContents>,
}

/// Headless [`ShadowBackend`] that only records what it is asked to do.
#[derive(Debug, Default)]
pub struct CommandRecorder {
    commands: Vec<ShadowCommand>,
    targets: HashMap<DepthTargetId, RecordedTarget>,
    resident: HashSet<Handle<MeshData>>,
    bound: Option<(DepthTargetId, u32)>,
    variant: Option<VariantId>,
    next_target: u32,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[ShadowCommand] {
        &self.commands
    }

    /// Forgets recorded commands but keeps targets, residency and binding.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn count(&self, pred: impl Fn(&ShadowCommand) -> bool) -> usize {
        self.commands.iter().filter(|&c| pred(c)).count()
    }

    pub fn draw_count(&self) -> usize {
        self.count(|c| matches!(c, ShadowCommand::Draw { .. }))
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn is_live(&self, target: DepthTargetId) -> bool {
        self.targets.contains_key(&target)
    }

    pub fn target_size(&self, target: DepthTargetId) -> Option<u32> {
        self.targets.get(&target).map(|t| t.size)
    }

    pub fn layer_count(&self, target: DepthTargetId) -> Option<u32> {
        self.targets.get(&target).map(|t| t.layers.len() as u32)
    }

    pub fn layer_contents(&self, target: DepthTargetId, layer: u32) -> Option<LayerContents> {
        self.targets
            .get(&target)
            .and_then(|t| t.layers.get(layer as usize).copied())
    }

    pub fn active_variant(&self) -> Option<VariantId> {
        self.variant
    }
}

impl ShadowBackend for CommandRecorder {
    fn create_depth_target(&mut self, desc: &DepthTargetDescriptor) -> DepthTargetId {
        let target = DepthTargetId::new(self.next_target);
        self.next_target += 1;
        let layers = desc.layers.max(1);
        self.targets.insert(
            target,
            RecordedTarget {
                size: desc.size,
                layers: vec![LayerContents::Undefined; layers as usize],
            },
        );
        self.commands.push(ShadowCommand::CreateTarget {
            target,
            size: desc.size,
            layers,
        });
        target
    }

    fn destroy_depth_target(&mut self, target: DepthTargetId) {
        if self.targets.remove(&target).is_none() {
            log::warn!("Destroying unknown depth target {:?}", target);
        }
        if matches!(self.bound, Some((bound, _)) if bound == target) {
            self.bound = None;
        }
        self.commands.push(ShadowCommand::DestroyTarget(target));
    }

    fn clear_depth_target(&mut self, target: DepthTargetId, layer: Option<u32>) {
        self.commands.push(ShadowCommand::Clear { target, layer });
        let Some(recorded) = self.targets.get_mut(&target) else {
            log::warn!("Clearing unknown depth target {:?}", target);
            return;
        };
        match layer {
            None => recorded.layers.fill(LayerContents::Cleared),
            Some(layer) => match recorded.layers.get_mut(layer as usize) {
                Some(contents) => *contents = LayerContents::Cleared,
                None => log::warn!("Layer {} out of range for {:?}", layer, target),
            },
        }
    }

    fn bind_depth_target(&mut self, target: DepthTargetId, layer: u32) {
        self.commands.push(ShadowCommand::Bind { target, layer });
        let in_range = self
            .targets
            .get(&target)
            .is_some_and(|t| (layer as usize) < t.layers.len());
        if in_range {
            self.bound = Some((target, layer));
        } else {
            log::warn!("Cannot bind layer {} of {:?}", layer, target);
            self.bound = None;
        }
    }

    fn write_variant_uniform(&mut self, variant: VariantId) {
        self.variant = Some(variant);
        self.commands.push(ShadowCommand::WriteVariant(variant));
    }

    fn is_geometry_resident(&self, mesh: Handle<MeshData>) -> bool {
        self.resident.contains(&mesh)
    }

    fn build_geometry(&mut self, mesh: Handle<MeshData>, _data: &MeshData) {
        self.resident.insert(mesh);
        self.commands.push(ShadowCommand::BuildGeometry(mesh));
    }

    fn update_geometry(&mut self, mesh: Handle<MeshData>, _data: &MeshData) {
        self.commands.push(ShadowCommand::UpdateGeometry(mesh));
    }

    fn draw_depth(&mut self, mesh: Handle<MeshData>, mvp: Mat4) {
        self.commands.push(ShadowCommand::Draw { mesh, mvp });
        let Some((target, layer)) = self.bound else {
            log::warn!("Depth draw of {:?} with no bound target", mesh);
            return;
        };
        if !self.resident.contains(&mesh) {
            log::warn!("Depth draw of non-resident mesh {:?}", mesh);
        }
        if let Some(contents) = self
            .targets
            .get_mut(&target)
            .and_then(|t| t.layers.get_mut(layer as usize))
        {
            *contents = match *contents {
                LayerContents::Drawn(n) => LayerContents::Drawn(n + 1),
                _ => LayerContents::Drawn(1),
            };
        }
    }
}
