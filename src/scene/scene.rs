use super::builder::{push_child, EntityBuilder};
use super::components::{Children, Name, Parent, ShadowRole, TransformComponent, WorldBounds};
use super::internal::transforms;
use crate::asset::{Assets, Handle, MeshData};
use crate::renderer::shadows::{Shadow, ShadowConfig};
use crate::scene::{Camera, Light, Transform};
use hecs::{Entity, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneError {
    MissingEntity(Entity),
    /// Re-parenting would make a node its own ancestor.
    Cycle { child: Entity, parent: Entity },
    RootIsFixed,
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::MissingEntity(e) => write!(f, "Entity {:?} does not exist", e),
            SceneError::Cycle { child, parent } => {
                write!(f, "Attaching {:?} under {:?} would create a cycle", child, parent)
            }
            SceneError::RootIsFixed => write!(f, "The scene root cannot be moved or removed"),
        }
    }
}

impl std::error::Error for SceneError {}

/// Scene graph plus the assets and camera the shadow pipeline reads.
///
/// Every node spawned through the scene hangs below `root`. Lights are
/// separate roots so that caster walks never reach them.
pub struct Scene {
    pub world: World,
    pub assets: Assets,
    root: Entity,
    camera: Camera,
}

impl Scene {
    pub fn new() -> Self {
        let mut world = World::new();
        let root = world.spawn((
            Name::new("root"),
            TransformComponent(Transform::IDENTITY),
            Children::default(),
            WorldBounds::default(),
        ));
        Self {
            world,
            assets: Assets::default(),
            root,
            camera: Camera::default(),
        }
    }

    pub fn root(&self) -> Entity {
        self.root
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> Handle<MeshData> {
        self.assets.meshes.insert(mesh)
    }

    /// Builder for a node placed under the scene root.
    pub fn build(&mut self) -> EntityBuilder<'_> {
        let root = self.root;
        EntityBuilder::new(&mut self.world).child_of(root)
    }

    /// Spawns an empty group node under `parent`.
    pub fn spawn_child(
        &mut self,
        parent: Entity,
        transform: Transform,
    ) -> Result<Entity, SceneError> {
        EntityBuilder::new(&mut self.world)
            .with_transform(transform)
            .child_of(parent)
            .spawn()
    }

    /// Spawns a shape under `parent`.
    pub fn spawn_shape(
        &mut self,
        parent: Entity,
        mesh: Handle<MeshData>,
        transform: Transform,
        role: ShadowRole,
    ) -> Result<Entity, SceneError> {
        EntityBuilder::new(&mut self.world)
            .with_transform(transform)
            .with_mesh(mesh)
            .with_role(role)
            .child_of(parent)
            .spawn()
    }

    /// Moves `child` (and its subtree) under `parent`.
    pub fn attach(&mut self, child: Entity, parent: Entity) -> Result<(), SceneError> {
        for entity in [child, parent] {
            if !self.world.contains(entity) {
                return Err(SceneError::MissingEntity(entity));
            }
        }
        if child == self.root {
            return Err(SceneError::RootIsFixed);
        }

        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(SceneError::Cycle { child, parent });
            }
            ancestor = self.world.get::<&Parent>(current).ok().map(|p| p.0);
        }

        self.detach_from_parent(child);
        let _ = self.world.insert_one(child, Parent(parent));
        push_child(&mut self.world, parent, child);
        Ok(())
    }

    pub fn set_transform(
        &mut self,
        entity: Entity,
        transform: Transform,
    ) -> Result<(), SceneError> {
        match self.world.get::<&mut TransformComponent>(entity) {
            Ok(mut local) => {
                local.0 = transform;
                Ok(())
            }
            Err(_) => Err(SceneError::MissingEntity(entity)),
        }
    }

    /// Spawns a light. Lights that cast shadows get a `Shadow` with the
    /// default configuration for their kind.
    pub fn add_light(&mut self, light: Light, transform: Transform) -> Entity {
        let config = light.shadow_kind().map(ShadowConfig::for_kind);
        self.spawn_light(light, transform, config)
    }

    pub fn add_light_with_shadow(
        &mut self,
        light: Light,
        transform: Transform,
        config: ShadowConfig,
    ) -> Entity {
        self.spawn_light(light, transform, Some(config))
    }

    fn spawn_light(
        &mut self,
        light: Light,
        transform: Transform,
        config: Option<ShadowConfig>,
    ) -> Entity {
        let entity = self.world.spawn((
            Name::new(format!("{:?} light", light.kind)),
            TransformComponent(transform),
            light,
        ));
        if let (Some(kind), Some(config)) = (light.shadow_kind(), config) {
            let _ = self.world.insert_one(entity, Shadow::new(kind, config));
        }
        log::debug!("Added light {:?} ({:?})", entity, light.kind);
        entity
    }

    /// Despawns `entity` and everything below it. A light takes its shadow
    /// with it.
    pub fn remove(&mut self, entity: Entity) -> Result<(), SceneError> {
        if entity == self.root {
            return Err(SceneError::RootIsFixed);
        }
        if !self.world.contains(entity) {
            return Err(SceneError::MissingEntity(entity));
        }
        self.detach_from_parent(entity);

        let mut pending = vec![entity];
        while let Some(current) = pending.pop() {
            if let Ok(children) = self.world.get::<&Children>(current) {
                pending.extend(children.0.iter().copied());
            }
            let _ = self.world.despawn(current);
        }
        Ok(())
    }

    /// Refreshes shape bounds from their meshes, then propagates world
    /// transforms and bounds through every tree.
    pub fn update(&mut self) {
        transforms::refresh_mesh_bounds(&mut self.world, &self.assets);
        transforms::propagate_transforms(&mut self.world);
    }

    fn detach_from_parent(&mut self, child: Entity) {
        let Ok(old_parent) = self.world.get::<&Parent>(child).map(|p| p.0) else {
            return;
        };
        if let Ok(mut siblings) = self.world.get::<&mut Children>(old_parent) {
            siblings.0.retain(|&e| e != child);
        }
        let _ = self.world.remove_one::<Parent>(child);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
