use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::renderer::shadows::{ShadowConfig, ShadowKind};

/// Global shadow settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    #[serde(default = "ShadowSettings::default_enabled")]
    pub enabled: bool,
    #[serde(default = "ShadowSettings::default_distant")]
    pub distant: ShadowConfig,
    #[serde(default = "ShadowSettings::default_spot")]
    pub spot: ShadowConfig,
    #[serde(default = "ShadowSettings::default_point")]
    pub point: ShadowConfig,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            distant: Self::default_distant(),
            spot: Self::default_spot(),
            point: Self::default_point(),
        }
    }
}

impl ShadowSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(settings) => {
                    info!("Loaded shadow settings from {:?}", path);
                    settings
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default shadow settings.",
                        path, err
                    );
                    ShadowSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Shadow settings file {:?} not found. Using default settings.",
                    path
                );
                ShadowSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default shadow settings.",
                    path, err
                );
                ShadowSettings::default()
            }
        }
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<ShadowSettings>(contents).map(Self::validate)
    }

    /// Configuration a new shadow of `kind` starts with.
    pub fn config_for(&self, kind: ShadowKind) -> ShadowConfig {
        let mut config = match kind {
            ShadowKind::Distant => self.distant,
            ShadowKind::Spot => self.spot,
            ShadowKind::Point => self.point,
        };
        if !self.enabled {
            config.enabled = false;
        }
        config
    }

    fn validate(mut self) -> Self {
        for (name, config) in [
            ("distant", &mut self.distant),
            ("spot", &mut self.spot),
            ("point", &mut self.point),
        ] {
            if config.resolution == 0 {
                warn!(
                    "Shadow resolution for {} lights must be positive. Using default value.",
                    name
                );
                config.resolution = ShadowConfig::default().resolution;
            }
            if !(config.near > 0.0 && config.far > config.near) {
                warn!("Shadow clip range for {} lights is invalid. Using default range.", name);
                let defaults = ShadowConfig::default();
                config.near = defaults.near;
                config.far = defaults.far;
            }
            config.validate();
        }
        self
    }

    const fn default_enabled() -> bool {
        true
    }

    fn default_distant() -> ShadowConfig {
        ShadowConfig::for_kind(ShadowKind::Distant)
    }

    fn default_spot() -> ShadowConfig {
        ShadowConfig::for_kind(ShadowKind::Spot)
    }

    fn default_point() -> ShadowConfig {
        ShadowConfig::for_kind(ShadowKind::Point)
    }
}
