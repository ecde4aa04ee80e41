//! Woven module emitter

use entweave_core::Module;

use super::Emitter;
use crate::error::Result;

/// Emits the woven module in the declaration language, loadable as a
/// reference by later weaves
pub struct YamlEmitter;

impl Emitter for YamlEmitter {
    fn emit(&self, module: &Module) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(module)?.into_bytes())
    }
}
