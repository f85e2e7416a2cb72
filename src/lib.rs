pub mod asset;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use renderer::shadows::{ShadowConfig, ShadowKind, ShadowPipeline};
pub use scene::Scene;
pub use settings::ShadowSettings;

/// Installs `env_logger` at `Info`, overridable through `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
