//! Artifact emitters
//!
//! Turn a woven module into the bytes that are cached and installed.

use entweave_core::decl::{ClassDecl, MethodDecl, MethodKind};
use entweave_core::{ArtifactFormat, Module};

use crate::error::Result;

pub mod rust;
pub mod yaml;

pub use rust::RustEmitter;
pub use yaml::YamlEmitter;

/// Serializes a woven module into an artifact
pub trait Emitter: Send + Sync {
    /// Produce the artifact
    fn emit(&self, module: &Module) -> Result<Vec<u8>>;
}

/// Emitter for `format`
pub fn emitter_for(format: ArtifactFormat) -> Box<dyn Emitter> {
    match format {
        ArtifactFormat::Yaml => Box::new(YamlEmitter),
        ArtifactFormat::Rust => Box::new(RustEmitter),
    }
}

/// The class's own method of `kind`, else the one it inherits from a base
/// declared in the same module
pub(crate) fn inherited_method<'m>(
    module: &'m Module,
    class: &'m ClassDecl,
    kind: MethodKind,
) -> Option<&'m MethodDecl> {
    let mut current = class;
    for _ in 0..=module.classes.len() {
        if let Some(method) = current.method(kind) {
            return Some(method);
        }
        current = module.class(current.extends.as_deref()?)?;
    }
    None
}
