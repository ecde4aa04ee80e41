//! Referenced module loading
//!
//! A module's `references` are paths of already-woven modules, relative to
//! the module file. Their entity classes become stubs the extractor can use
//! as bases.

use std::path::Path;

use entweave_core::parser::Parser;
use entweave_core::resolve::StubIndex;
use entweave_core::{Code, Diagnostic, Module};

use crate::error::{Error, Result};

/// Stubs from every referenced module, plus warnings about the references
#[derive(Debug, Default)]
pub struct References {
    /// Index of woven classes
    pub index: StubIndex,
    /// Problems that do not prevent weaving
    pub warnings: Vec<Diagnostic>,
}

/// Load the references of `module`, resolving paths against `base_dir`
///
/// A reference that has not been woven contributes nothing and is reported
/// as a warning. One that cannot be read or parsed is an error.
pub fn load_references(module: &Module, base_dir: &Path) -> Result<References> {
    let parser = Parser::new();
    let mut references = References::default();

    for reference in &module.references {
        let path = base_dir.join(reference);
        let referenced = parser.parse_file(&path).map_err(|source| Error::Reference {
            path: path.clone(),
            source,
        })?;

        match references.index.index_module(&referenced) {
            Ok(count) => {
                tracing::debug!(
                    "indexed {} classes from referenced module '{}'",
                    count,
                    referenced.module
                );
            }
            Err(unwoven) => references.warnings.push(Diagnostic::warning(
                Code::UnwovenReference,
                format!(
                    "referenced module '{}' ({}) has not been woven; its classes cannot be used as bases",
                    unwoven.0,
                    path.display()
                ),
            )),
        }
    }

    Ok(references)
}

/// Raw contents of every module `module` references, in declaration order
///
/// These feed the cache key: re-weaving a reference moves slots in every
/// module built on it.
pub fn reference_bytes(module: &Module, base_dir: &Path) -> Result<Vec<Vec<u8>>> {
    module
        .references
        .iter()
        .map(|reference| {
            let path = base_dir.join(reference);
            std::fs::read(&path).map_err(|source| Error::Reference {
                path: path.clone(),
                source: entweave_core::Error::Read { path, source },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use entweave_core::resolve::ModuleResolver;
    use tempfile::TempDir;

    fn module(references: &[&str]) -> Module {
        let mut module = Module::new("fleet");
        module.references = references.iter().map(|r| r.to_string()).collect();
        module
    }

    #[test]
    fn test_load_woven_reference() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("core.woven.yaml"),
            r#"
module: core
woven: { weaver: "0.1.0" }
classes:
  - name: core.Asset
    entity: true
    storage:
      inherited: 0
      slots:
        - { index: 0, name: __id, type: i64, role: identity }
"#,
        )
        .unwrap();

        let references = load_references(&module(&["core.woven.yaml"]), dir.path()).unwrap();
        assert!(references.warnings.is_empty());
        assert!(references.index.resolve("core.Asset").is_some());
    }

    #[test]
    fn test_unwoven_reference_warns() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("core.yaml"), "module: core\n").unwrap();

        let references = load_references(&module(&["core.yaml"]), dir.path()).unwrap();
        assert!(references.index.is_empty());
        assert_eq!(references.warnings.len(), 1);
        assert_eq!(references.warnings[0].code, Code::UnwovenReference);
    }

    #[test]
    fn test_missing_reference_is_environment_error() {
        let dir = TempDir::new().unwrap();
        let err = load_references(&module(&["gone.woven.yaml"]), dir.path()).unwrap_err();
        assert!(err.is_environment());
        assert_eq!(err.code(), Code::InputRead);
    }

    #[test]
    fn test_reference_bytes_in_declaration_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.woven.yaml"), "module: a\n").unwrap();
        std::fs::write(dir.path().join("b.woven.yaml"), "module: b\n").unwrap();

        let bytes =
            reference_bytes(&module(&["b.woven.yaml", "a.woven.yaml"]), dir.path()).unwrap();
        assert_eq!(bytes, [b"module: b\n".to_vec(), b"module: a\n".to_vec()]);

        let err = reference_bytes(&module(&["gone.woven.yaml"]), dir.path()).unwrap_err();
        assert_eq!(err.code(), Code::InputRead);
    }
}
