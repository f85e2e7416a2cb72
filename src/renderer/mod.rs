pub mod backend;
pub mod internal;
pub mod pipeline_builder;
pub mod primitives;
pub mod program;
pub mod recorder;
pub mod shadows;
pub mod vertex;

pub use backend::{DepthTargetDescriptor, DepthTargetId, ShadowBackend};
pub use internal::{ContextError, RenderContext, WgpuShadowBackend};
pub use pipeline_builder::DepthPipelineBuilder;
pub use primitives::{cube_mesh, plane_mesh, sphere_mesh};
pub use program::{
    ProgramComposer, ProgramLibrary, ProgramStage, ValueType, VariantId, VariantSelector,
};
pub use recorder::{CommandRecorder, LayerContents, ShadowCommand};
pub use vertex::Vertex;
