// scene/mod.rs

pub mod bounds;
pub mod builder;
pub mod camera;
pub mod components;
pub mod frustum;
pub mod light;
pub mod scene;
pub mod transform;
pub mod traversal;

pub(crate) mod internal;

// Re-export commonly used types
pub use bounds::Aabb;
pub use builder::EntityBuilder;
pub use camera::Camera;
pub use frustum::Frustum;
pub use light::{Light, LightKind};
pub use scene::{Scene, SceneError};
pub use transform::Transform;
pub use traversal::{SceneTraverser, TraversalEvent, Walk};

// Re-export all components
pub use components::{
    AffectingShadows,
    Children,
    LocalBounds,
    MeshComponent,
    Name,
    NormalMatrix,
    Parent,
    ShadowRole,
    TransformComponent,
    WorldBounds,
    WorldTransform,
};
