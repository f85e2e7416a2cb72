use crate::renderer::program::{ProgramComposer, ProgramStage, ValueType, VariantId};

pub const DEPTH_VARIANT: &str = "shadow_depth";
pub const DEPTH_CUBE_VARIANT: &str = "shadow_depth_cube";
pub const FACTOR_FUNCTION: &str = "shadow_factor";

pub const DEPTH_SHADER: &str = include_str!("../../shader/shadow_depth.wgsl");
pub const FACTOR_SHADER: &str = include_str!("../../shader/shadow_factor.wgsl");

/// Variant ids of the shadow programs in a composer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShadowPrograms {
    pub depth: VariantId,
    pub depth_cube: VariantId,
}

impl ShadowPrograms {
    /// Declares the shadow uniforms, varyings, the factor library and the
    /// two depth variants.
    pub fn register(composer: &mut dyn ProgramComposer) -> Self {
        composer.register_uniform("u_shadow_mvp", ValueType::Mat4);
        composer.register_uniform("u_shadow_view_proj", ValueType::Mat4Array(6));
        composer.register_uniform("u_shadow_splits", ValueType::Vec4);
        composer.register_uniform("u_shadow_params", ValueType::Vec4);
        composer.register_uniform("u_shadow_clip", ValueType::Vec4);
        composer.register_uniform("u_shadow_light_position", ValueType::Vec4);
        composer.register_uniform("u_shadow_map", ValueType::DepthTextureArray);

        composer.register_varying("v_world_position", ValueType::Vec3);
        composer.register_varying("v_view_depth", ValueType::Float);

        composer.register_function(FACTOR_FUNCTION, FACTOR_SHADER);

        let depth = composer.register_variant(
            DEPTH_VARIANT,
            &[(ProgramStage::Vertex, "vs_depth")],
        );
        let depth_cube = composer.register_variant(
            DEPTH_CUBE_VARIANT,
            &[(ProgramStage::Vertex, "vs_depth_cube")],
        );

        Self { depth, depth_cube }
    }

    pub fn variant_for(&self, omnidirectional: bool) -> VariantId {
        if omnidirectional {
            self.depth_cube
        } else {
            self.depth
        }
    }
}
