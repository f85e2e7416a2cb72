pub mod context;
pub mod shadows;

pub use context::{ContextError, RenderContext};
pub use shadows::WgpuShadowBackend;
