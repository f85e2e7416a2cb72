use std::collections::HashMap;

use crate::renderer::backend::ShadowBackend;

/// Name of the integer uniform the variant selector writes.
pub const VARIANT_UNIFORM: &str = "u_variant";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramStage {
    Vertex,
    Fragment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Mat4Array(u32),
    DepthTextureArray,
}

/// Registration surface of the program composition system.
///
/// How the registered pieces are stitched into linked programs is up to the
/// implementation; the shadow code only declares what it needs.
pub trait ProgramComposer {
    fn register_uniform(&mut self, name: &str, ty: ValueType);
    fn register_varying(&mut self, name: &str, ty: ValueType);
    fn register_function(&mut self, name: &str, source: &str);
    /// Declares an execution variant with its per-stage entry source.
    /// Registering the same name again returns the existing id.
    fn register_variant(&mut self, name: &str, stages: &[(ProgramStage, &str)]) -> VariantId;
}

#[derive(Clone, Debug)]
pub struct VariantDecl {
    pub name: String,
    pub stages: Vec<(ProgramStage, String)>,
}

/// In-memory [`ProgramComposer`] keyed by declaration name.
#[derive(Debug, Default)]
pub struct ProgramLibrary {
    uniforms: HashMap<String, ValueType>,
    varyings: HashMap<String, ValueType>,
    functions: HashMap<String, String>,
    variants: Vec<VariantDecl>,
}

impl ProgramLibrary {
    pub fn new() -> Self {
        let mut library = Self::default();
        library.register_uniform(VARIANT_UNIFORM, ValueType::Int);
        library
    }

    pub fn uniform(&self, name: &str) -> Option<ValueType> {
        self.uniforms.get(name).copied()
    }

    pub fn varying(&self, name: &str) -> Option<ValueType> {
        self.varyings.get(name).copied()
    }

    pub fn function(&self, name: &str) -> Option<&str> {
        self.functions.get(name).map(String::as_str)
    }

    pub fn variant_id(&self, name: &str) -> Option<VariantId> {
        self.variants
            .iter()
            .position(|v| v.name == name)
            .map(|index| VariantId(index as u32))
    }

    pub fn variant(&self, id: VariantId) -> Option<&VariantDecl> {
        self.variants.get(id.0 as usize)
    }

    pub fn variant_source(&self, id: VariantId, stage: ProgramStage) -> Option<&str> {
        self.variant(id)?
            .stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, source)| source.as_str())
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }
}

fn declare(table: &mut HashMap<String, ValueType>, kind: &str, name: &str, ty: ValueType) {
    match table.get(name) {
        Some(existing) if *existing != ty => log::warn!(
            "{} '{}' already declared as {:?}, ignoring {:?}",
            kind,
            name,
            existing,
            ty
        ),
        Some(_) => {}
        None => {
            table.insert(name.to_owned(), ty);
        }
    }
}

impl ProgramComposer for ProgramLibrary {
    fn register_uniform(&mut self, name: &str, ty: ValueType) {
        declare(&mut self.uniforms, "Uniform", name, ty);
    }

    fn register_varying(&mut self, name: &str, ty: ValueType) {
        declare(&mut self.varyings, "Varying", name, ty);
    }

    fn register_function(&mut self, name: &str, source: &str) {
        self.functions
            .entry(name.to_owned())
            .or_insert_with(|| source.to_owned());
    }

    fn register_variant(&mut self, name: &str, stages: &[(ProgramStage, &str)]) -> VariantId {
        if let Some(id) = self.variant_id(name) {
            return id;
        }
        let id = VariantId(self.variants.len() as u32);
        self.variants.push(VariantDecl {
            name: name.to_owned(),
            stages: stages
                .iter()
                .map(|(stage, source)| (*stage, (*source).to_owned()))
                .collect(),
        });
        log::debug!("Registered program variant '{}' as {:?}", name, id);
        id
    }
}

/// Selects the active variant by writing [`VARIANT_UNIFORM`], skipping the
/// write when the variant is already active.
#[derive(Debug, Default)]
pub struct VariantSelector {
    active: Option<VariantId>,
    writes: u32,
}

impl VariantSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the uniform was written.
    pub fn select<B: ShadowBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        variant: VariantId,
    ) -> bool {
        if self.active == Some(variant) {
            return false;
        }
        backend.write_variant_uniform(variant);
        self.active = Some(variant);
        self.writes += 1;
        true
    }

    pub fn active(&self) -> Option<VariantId> {
        self.active
    }

    pub fn writes(&self) -> u32 {
        self.writes
    }

    /// Forces the next `select` to write, e.g. after switching backends.
    pub fn invalidate(&mut self) {
        self.active = None;
    }
}
