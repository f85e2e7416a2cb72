// scene/builder.rs
// Fluent helper for spawning scene nodes - uses pure hecs

use hecs::{Entity, World};

use super::components::*;
use super::scene::SceneError;
use crate::asset::{Handle, MeshData};
use crate::scene::{Aabb, Transform};

/// Helper for building nodes with a fluent API.
///
/// Without `child_of` the node becomes a root of its own tree and is not
/// reached by walks that start at the scene root.
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    builder: hecs::EntityBuilder,
    parent: Option<Entity>,
}

impl<'w> EntityBuilder<'w> {
    pub fn new(world: &'w mut World) -> Self {
        let mut builder = hecs::EntityBuilder::new();
        builder.add(TransformComponent(Transform::IDENTITY));
        Self {
            world,
            builder,
            parent: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.builder.add(Name::new(name));
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.builder.add(TransformComponent(transform));
        self
    }

    /// Makes the node a shape. Its local bounds follow the mesh on every
    /// scene update.
    pub fn with_mesh(mut self, mesh: Handle<MeshData>) -> Self {
        self.builder.add(MeshComponent(mesh));
        self.builder.add(ShadowRole::default());
        self.builder.add(AffectingShadows::default());
        self
    }

    /// Fixed local bounds for nodes that carry no mesh.
    pub fn with_bounds(mut self, bounds: Aabb) -> Self {
        self.builder.add(LocalBounds(bounds));
        self
    }

    pub fn with_role(mut self, role: ShadowRole) -> Self {
        self.builder.add(role);
        self
    }

    /// Adds an arbitrary extra component.
    pub fn with<C: hecs::Component>(mut self, component: C) -> Self {
        self.builder.add(component);
        self
    }

    pub fn child_of(mut self, parent: Entity) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Spawns the node and appends it to its parent's children.
    pub fn spawn(mut self) -> Result<Entity, SceneError> {
        if let Some(parent) = self.parent {
            if !self.world.contains(parent) {
                return Err(SceneError::MissingEntity(parent));
            }
            self.builder.add(Parent(parent));
        }
        self.builder.add(WorldBounds::default());

        let entity = self.world.spawn(self.builder.build());
        if let Some(parent) = self.parent {
            push_child(self.world, parent, entity);
        }
        log::trace!("Spawned node {:?} under {:?}", entity, self.parent);
        Ok(entity)
    }
}

pub(crate) fn push_child(world: &mut World, parent: Entity, child: Entity) {
    if let Ok(mut children) = world.get::<&mut Children>(parent) {
        children.0.push(child);
        return;
    }
    let _ = world.insert_one(parent, Children(vec![child]));
}
