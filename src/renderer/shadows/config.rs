//! Per-shadow configuration and change tracking.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::ShadowKind;

pub const MIN_CASCADES: u32 = 2;
pub const MAX_CASCADES: u32 = 4;
pub const MAX_FILTER_SAMPLES: u32 = 16;
pub const MIN_RESOLUTION: u32 = 16;
pub const MAX_RESOLUTION: u32 = 8192;

pub(crate) const MIN_NEAR: f32 = 1.0e-3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub enabled: bool,
    /// Edge length of each shadow map face, in texels.
    pub resolution: u32,
    /// Clip range of spot and point shadow cameras. Cascades split the main
    /// camera's range instead.
    pub near: f32,
    pub far: f32,
    /// How dark a fully occluded receiver gets, in [0, 1].
    pub opacity: f32,
    pub filter_enabled: bool,
    /// Extra samples taken around the centre sample, at most 16.
    pub filter_samples: u32,
    /// Spread of the filter kernel.
    pub filter_density: f32,
    pub num_cascades: u32,
    /// Blend between logarithmic (0) and uniform (1) cascade splits.
    pub cascade_weight: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 1024,
            near: 0.1,
            far: 100.0,
            opacity: 1.0,
            filter_enabled: true,
            filter_samples: 8,
            filter_density: 1.0,
            num_cascades: 4,
            cascade_weight: 0.5,
        }
    }
}

impl ShadowConfig {
    /// Default configuration for each shadow flavour.
    pub fn for_kind(kind: ShadowKind) -> Self {
        match kind {
            ShadowKind::Distant => Self {
                resolution: 2048,
                num_cascades: 4,
                cascade_weight: 0.5,
                ..Self::default()
            },
            ShadowKind::Spot => Self {
                resolution: 1024,
                near: 0.1,
                far: 50.0,
                ..Self::default()
            },
            ShadowKind::Point => Self {
                resolution: 512,
                near: 0.05,
                far: 25.0,
                ..Self::default()
            },
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Clamps every field into its valid range. Returns true when anything
    /// changed.
    pub fn validate(&mut self) -> bool {
        let before = *self;

        self.resolution = self.resolution.clamp(MIN_RESOLUTION, MAX_RESOLUTION);
        if !self.near.is_finite() || self.near < MIN_NEAR {
            self.near = MIN_NEAR;
        }
        if !self.far.is_finite() || self.far <= self.near {
            self.far = self.near * 2.0;
        }
        self.opacity = finite_or(self.opacity, 1.0).clamp(0.0, 1.0);
        self.filter_samples = self.filter_samples.min(MAX_FILTER_SAMPLES);
        self.filter_density = finite_or(self.filter_density, 0.0).max(0.0);
        self.num_cascades = self.num_cascades.clamp(MIN_CASCADES, MAX_CASCADES);
        self.cascade_weight = finite_or(self.cascade_weight, 0.5).clamp(0.0, 1.0);

        let changed = *self != before;
        if changed {
            log::trace!("Shadow config clamped: {:?} -> {:?}", before, self);
        }
        changed
    }

    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }

    /// Which parts of the shadow are stale after moving from `previous` to
    /// `self`.
    pub fn diff(&self, previous: &ShadowConfig) -> ShadowDirty {
        let mut dirty = ShadowDirty::empty();
        dirty.set(ShadowDirty::ENABLED, self.enabled != previous.enabled);
        dirty.set(ShadowDirty::RESOLUTION, self.resolution != previous.resolution);
        dirty.set(
            ShadowDirty::CLIP,
            self.near != previous.near || self.far != previous.far,
        );
        dirty.set(ShadowDirty::OPACITY, self.opacity != previous.opacity);
        dirty.set(
            ShadowDirty::FILTER,
            self.filter_enabled != previous.filter_enabled
                || self.filter_samples != previous.filter_samples
                || self.filter_density != previous.filter_density,
        );
        dirty.set(
            ShadowDirty::CASCADE_COUNT,
            self.num_cascades != previous.num_cascades,
        );
        dirty.set(
            ShadowDirty::CASCADE_WEIGHT,
            self.cascade_weight != previous.cascade_weight,
        );
        dirty
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

bitflags! {
    /// What changed since the shadow was last prepared.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ShadowDirty: u32 {
        const ENABLED        = 1 << 0;
        const RESOLUTION     = 1 << 1;
        const CLIP           = 1 << 2;
        const OPACITY        = 1 << 3;
        const FILTER         = 1 << 4;
        const CASCADE_COUNT  = 1 << 5;
        const CASCADE_WEIGHT = 1 << 6;
        const CAMERA         = 1 << 7;
        const LIGHT          = 1 << 8;
    }
}

impl ShadowDirty {
    /// Changes that invalidate the light-space projection of some face.
    pub const PROJECTION: Self = Self::CLIP
        .union(Self::CASCADE_COUNT)
        .union(Self::CASCADE_WEIGHT)
        .union(Self::CAMERA)
        .union(Self::LIGHT)
        .union(Self::RESOLUTION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_clamps_out_of_range_values() {
        let mut config = ShadowConfig {
            resolution: 1,
            near: -1.0,
            far: -5.0,
            opacity: 3.0,
            filter_samples: 64,
            filter_density: -2.0,
            num_cascades: 9,
            cascade_weight: f32::NAN,
            ..ShadowConfig::default()
        };
        assert!(config.validate());
        assert_eq!(config.resolution, MIN_RESOLUTION);
        assert_eq!(config.near, MIN_NEAR);
        assert!(config.far > config.near);
        assert_eq!(config.opacity, 1.0);
        assert_eq!(config.filter_samples, MAX_FILTER_SAMPLES);
        assert_eq!(config.filter_density, 0.0);
        assert_eq!(config.num_cascades, MAX_CASCADES);
        assert_eq!(config.cascade_weight, 0.5);

        config.num_cascades = 1;
        config.validate();
        assert_eq!(config.num_cascades, MIN_CASCADES);
    }

    #[test]
    fn valid_config_is_untouched() {
        let mut config = ShadowConfig::for_kind(ShadowKind::Spot);
        assert!(!config.validate());
    }

    #[test]
    fn kind_defaults_are_already_valid() {
        for kind in [ShadowKind::Distant, ShadowKind::Spot, ShadowKind::Point] {
            let config = ShadowConfig::for_kind(kind);
            assert_eq!(config.validated(), config);
        }
    }

    #[test]
    fn diff_reports_changed_fields_only() {
        let base = ShadowConfig::default();
        assert!(base.diff(&base).is_empty());

        let changed = ShadowConfig {
            opacity: 0.5,
            num_cascades: 3,
            ..base
        };
        assert_eq!(
            changed.diff(&base),
            ShadowDirty::OPACITY | ShadowDirty::CASCADE_COUNT
        );
    }

    #[test]
    fn config_round_trips_through_json_with_defaults() {
        let config: ShadowConfig = serde_json::from_str(r#"{ "opacity": 0.25 }"#).unwrap();
        assert_eq!(config.opacity, 0.25);
        assert_eq!(config.resolution, ShadowConfig::default().resolution);
    }
}
