pub mod cascade;
pub mod collector;
pub mod config;
pub mod factor;
pub mod pipeline;
pub mod programs;
pub mod renderer;
pub mod shadow;

pub use cascade::{
    compute_cascade_splits, fit_light_to_slice, CascadeComputer, CascadeSplits, LightFit,
};
pub use collector::CasterCollector;
pub use config::{ShadowConfig, ShadowDirty, MAX_CASCADES, MAX_FILTER_SAMPLES, MIN_CASCADES};
pub use factor::{
    blend_shadow, point_face, point_pseudo_depth, point_spread, select_cascade, DepthSampler,
    ShadowFactorModel, ShadowUniform, POINT_DENSITY_SCALE, POINT_KERNEL, POISSON_DISK,
};
pub use pipeline::ShadowPipeline;
pub use programs::ShadowPrograms;
pub use renderer::{ShadowFrameStats, ShadowMapRenderer};
pub use shadow::{Shadow, ShadowFace, ShadowKind, SubCamera, POINT_FACE_BASES, POINT_FACE_COUNT};
