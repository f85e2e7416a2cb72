use glam::Vec3;

use crate::renderer::shadows::ShadowKind;
use crate::scene::Transform;

/// Light flavour together with the parameters only that flavour has.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    Distant,
    Spot {
        inner_angle: f32,
        outer_angle: f32,
        range: f32,
    },
    Point {
        range: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
}

impl Light {
    pub fn ambient(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Ambient,
            color,
            intensity,
        }
    }

    pub fn distant(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Distant,
            color,
            intensity,
        }
    }

    pub fn spot(
        color: Vec3,
        intensity: f32,
        inner_angle: f32,
        outer_angle: f32,
        range: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot {
                inner_angle,
                outer_angle,
                range,
            },
            color,
            intensity,
        }
    }

    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point { range },
            color,
            intensity,
        }
    }

    /// Shadow flavour this light casts, if any. Ambient light has none.
    pub fn shadow_kind(&self) -> Option<ShadowKind> {
        match self.kind {
            LightKind::Ambient => None,
            LightKind::Distant => Some(ShadowKind::Distant),
            LightKind::Spot { .. } => Some(ShadowKind::Spot),
            LightKind::Point { .. } => Some(ShadowKind::Point),
        }
    }

    /// Outer cone half-angle, for spot lights.
    pub fn cone_angle(&self) -> Option<f32> {
        match self.kind {
            LightKind::Spot { outer_angle, .. } => Some(outer_angle),
            _ => None,
        }
    }

    /// Intensity falloff at `position` for a light placed at `transform`.
    ///
    /// Distant and ambient lights do not fall off. Spot lights combine a
    /// smooth cone falloff with a range window; point lights use
    /// `1 / (1 + d^2)` windowed by range.
    pub fn attenuation(&self, transform: &Transform, position: Vec3) -> f32 {
        match self.kind {
            LightKind::Ambient | LightKind::Distant => 1.0,
            LightKind::Spot {
                inner_angle,
                outer_angle,
                range,
            } => {
                let to_fragment = position - transform.translation;
                let distance = to_fragment.length();
                if distance <= f32::EPSILON {
                    return 1.0;
                }
                let (inner, outer) = if inner_angle > outer_angle {
                    (outer_angle, inner_angle)
                } else {
                    (inner_angle, outer_angle)
                };
                let cos_angle = (to_fragment / distance).dot(transform.forward());
                let cone = smoothstep(outer.cos(), inner.cos(), cos_angle);
                cone * range_window(distance, range)
            }
            LightKind::Point { range } => {
                let distance = (position - transform.translation).length();
                range_window(distance, range) / (1.0 + distance * distance)
            }
        }
    }
}

fn range_window(distance: f32, range: f32) -> f32 {
    if range <= 0.0 {
        return 1.0;
    }
    let ratio = (distance / range).powi(4);
    (1.0 - ratio).clamp(0.0, 1.0).powi(2)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if (edge1 - edge0).abs() <= f32::EPSILON {
        return if x >= edge1 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
