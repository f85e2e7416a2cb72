use glam::Mat4;

use crate::asset::{Handle, MeshData};
use crate::renderer::program::VariantId;

/// Opaque id of a layered depth target owned by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepthTargetId(u32);

impl DepthTargetId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepthTargetDescriptor {
    pub label: String,
    /// Width and height of every layer, in texels.
    pub size: u32,
    /// One layer per shadow face.
    pub layers: u32,
}

/// GPU context threaded through every shadow bind and draw.
///
/// The shadow renderer never talks to a device directly. Commands are issued
/// in frame order; a backend is free to record and replay them later as long
/// as it keeps that order.
pub trait ShadowBackend {
    fn create_depth_target(&mut self, desc: &DepthTargetDescriptor) -> DepthTargetId;

    fn destroy_depth_target(&mut self, target: DepthTargetId);

    /// Clears one layer, or every layer when `layer` is `None`, to the far
    /// plane.
    fn clear_depth_target(&mut self, target: DepthTargetId, layer: Option<u32>);

    /// Makes `layer` of `target` the destination of subsequent draws.
    fn bind_depth_target(&mut self, target: DepthTargetId, layer: u32);

    /// Writes the integer uniform that selects the active program variant.
    fn write_variant_uniform(&mut self, variant: VariantId);

    fn is_geometry_resident(&self, mesh: Handle<MeshData>) -> bool;

    fn build_geometry(&mut self, mesh: Handle<MeshData>, data: &MeshData);

    fn update_geometry(&mut self, mesh: Handle<MeshData>, data: &MeshData);

    /// Depth-only draw of a resident mesh into the bound layer. `mvp` already
    /// combines the face view-projection with the caster's world matrix.
    fn draw_depth(&mut self, mesh: Handle<MeshData>, mvp: Mat4);
}
