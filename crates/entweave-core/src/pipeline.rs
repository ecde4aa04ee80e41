//! Weaving pipeline
//!
//! Runs the phases of one module in order: extract, derive implicit columns,
//! validate the type tower, transform. Strictly sequential and free of I/O.

use crate::config::WeaverSetup;
use crate::decl::{Module, WovenStamp};
use crate::diagnostic::{Diagnostic, DiagnosticSink, Halted};
use crate::extract::extract;
use crate::implicit::derive_implicit_columns;
use crate::resolve::ModuleResolver;
use crate::schema::SchemaModel;
use crate::tower;
use crate::transform::TransformEngine;
use crate::WEAVER_VERSION;

/// Weave `module` in place
///
/// Schema and transform problems are reported to `sink`. The module is
/// stamped as woven only when no class failed; callers should treat an
/// unstamped module as a failed weave. `Err(Halted)` means processing stopped
/// early and the module may be partially transformed.
pub fn weave_module(
    module: &mut Module,
    fingerprint: &str,
    resolver: &dyn ModuleResolver,
    setup: &WeaverSetup,
    sink: &mut dyn DiagnosticSink,
) -> Result<SchemaModel, Halted> {
    sink.emit(Diagnostic::debug(format!(
        "extracting schema of module '{}'",
        module.module
    )))?;
    let mut model = extract(module, fingerprint, resolver, sink)?;

    derive_implicit_columns(&mut model, sink)?;
    tower::validate(&mut model, resolver, sink)?;

    let engine = TransformEngine::new(setup.slot_budget);
    let woven = engine.run(module, &mut model, sink)?;

    if !model.has_failures() {
        module.woven = Some(WovenStamp {
            weaver: WEAVER_VERSION.to_string(),
        });
    }

    sink.emit(Diagnostic::info(format!(
        "wove {} of {} entity classes in module '{}'",
        woven,
        model.local_ids().len(),
        module.module
    )))?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolve::NoReferences;

    #[test]
    fn test_successful_weave_is_stamped() {
        let mut module = Parser::new()
            .parse_yaml(
                r#"
module: m
classes:
  - name: m.A
    entity: true
"#,
            )
            .unwrap();
        let mut diagnostics = Vec::new();
        let model = weave_module(
            &mut module,
            "fp",
            &NoReferences,
            &WeaverSetup::new("m.yaml"),
            &mut diagnostics,
        )
        .unwrap();

        assert!(!model.has_failures());
        assert_eq!(
            module.woven.as_ref().map(|w| w.weaver.as_str()),
            Some(WEAVER_VERSION)
        );
        assert!(diagnostics.iter().all(|d| !d.is_error()));
    }

    #[test]
    fn test_failed_weave_is_not_stamped() {
        let mut module = Parser::new()
            .parse_yaml(
                r#"
module: m
classes:
  - name: m.A
    entity: true
    members:
      - field: { name: __inherits, type: String }
"#,
            )
            .unwrap();
        let mut diagnostics = Vec::new();
        let model = weave_module(
            &mut module,
            "fp",
            &NoReferences,
            &WeaverSetup::new("m.yaml"),
            &mut diagnostics,
        )
        .unwrap();

        assert!(model.has_failures());
        assert!(module.woven.is_none());
        assert_eq!(diagnostics.iter().filter(|d| d.is_error()).count(), 1);
    }
}
