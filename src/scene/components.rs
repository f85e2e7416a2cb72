// scene/components.rs
// Pure hecs components for the shadow scene graph

use crate::asset::{Handle, MeshData};
use crate::scene::{Aabb, Transform};
use glam::Mat3;

// ============================================================================
// Hierarchy
// ============================================================================

/// Local transform relative to the parent node.
#[derive(Debug, Clone, Copy)]
pub struct TransformComponent(pub Transform);

/// World-space transform (computed from hierarchy)
#[derive(Debug, Clone, Copy)]
pub struct WorldTransform(pub Transform);

/// Inverse-transpose of the world basis. Keeps the last valid value when the
/// world transform becomes singular.
#[derive(Debug, Clone, Copy)]
pub struct NormalMatrix(pub Mat3);

impl Default for NormalMatrix {
    fn default() -> Self {
        Self(Mat3::IDENTITY)
    }
}

/// Parent entity reference
#[derive(Debug, Clone, Copy)]
pub struct Parent(pub hecs::Entity);

/// Ordered child entities
#[derive(Debug, Clone, Default)]
pub struct Children(pub Vec<hecs::Entity>);

/// Name component for debugging
#[derive(Debug, Clone)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

// ============================================================================
// Bounds
// ============================================================================

/// Bounds in the node's local space. Shapes get theirs from the mesh.
#[derive(Debug, Clone, Copy)]
pub struct LocalBounds(pub Aabb);

/// World-space bounds. For group nodes this is the union of the children.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldBounds(pub Aabb);

// ============================================================================
// Shapes
// ============================================================================

/// Mesh component
#[derive(Debug, Clone, Copy)]
pub struct MeshComponent(pub Handle<MeshData>);

/// How a shape takes part in shadowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowRole {
    pub caster: bool,
    pub receiver: bool,
}

impl ShadowRole {
    pub const NONE: Self = Self {
        caster: false,
        receiver: false,
    };
    pub const CASTER: Self = Self {
        caster: true,
        receiver: false,
    };
    pub const RECEIVER: Self = Self {
        caster: false,
        receiver: true,
    };
    pub const BOTH: Self = Self {
        caster: true,
        receiver: true,
    };
}

impl Default for ShadowRole {
    fn default() -> Self {
        Self::BOTH
    }
}

/// Light entities whose shadows reach this receiver this frame.
///
/// Only entity ids are stored; the lights own their shadows.
#[derive(Debug, Clone, Default)]
pub struct AffectingShadows(pub Vec<hecs::Entity>);

impl AffectingShadows {
    pub fn link(&mut self, light: hecs::Entity) {
        if !self.0.contains(&light) {
            self.0.push(light);
        }
    }

    pub fn contains(&self, light: hecs::Entity) -> bool {
        self.0.contains(&light)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}
