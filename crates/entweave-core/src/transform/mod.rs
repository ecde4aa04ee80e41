//! Transform engine
//!
//! Applies an ordered list of per-class passes to the declaration tree, guided
//! by the schema model. Each class is transformed on a scratch copy; a pass
//! that fails leaves the declaration untouched, marks the class failed and the
//! engine moves on to the next class.
//!
//! # Passes
//!
//! - `implicit_columns` - Insert the synthesized reserved fields into root classes
//! - `storage_layout` - Attach the flattened slot layout, enforcing the slot budget
//! - `reroute` - Route property accessors through storage slots
//! - `identity_equality` - Synthesize identity-based equality and hashing

use crate::decl::{ClassDecl, Module};
use crate::diagnostic::{Diagnostic, DiagnosticSink, Halted};
use crate::schema::{ClassId, EntityClass, SchemaModel};

pub mod columns;
pub mod equality;
pub mod layout;
pub mod reroute;

pub use columns::ImplicitColumns;
pub use equality::IdentityEquality;
pub use layout::StorageLayoutPass;
pub use reroute::Reroute;

/// What a pass sees of the schema while transforming one class
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Schema model of the module
    pub model: &'a SchemaModel,
    /// Class being transformed
    pub id: ClassId,
    /// Storage slot budget per hierarchy
    pub slot_budget: usize,
}

impl<'a> TransformContext<'a> {
    /// Schema entry of the class being transformed
    pub fn entity(&self) -> &'a EntityClass {
        self.model.get(self.id)
    }
}

/// One augmentation applied to every woven class
pub trait ClassTransform: Send + Sync {
    /// Pass name, for logging
    fn name(&self) -> &'static str;

    /// Rewrite `class`. An `Err` is a transform error for this class.
    fn apply(&self, cx: &TransformContext<'_>, class: &mut ClassDecl) -> Result<(), Diagnostic>;
}

/// Runs the passes over every local entity class
pub struct TransformEngine {
    passes: Vec<Box<dyn ClassTransform>>,
    slot_budget: usize,
}

impl TransformEngine {
    /// Engine with the standard passes
    pub fn new(slot_budget: usize) -> Self {
        Self {
            passes: vec![
                Box::new(ImplicitColumns),
                Box::new(StorageLayoutPass),
                Box::new(Reroute),
                Box::new(IdentityEquality),
            ],
            slot_budget,
        }
    }

    /// Names of the passes, in application order
    pub fn passes(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Transform every class that has not failed; returns how many were woven
    pub fn run(
        &self,
        module: &mut Module,
        model: &mut SchemaModel,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<usize, Halted> {
        let mut woven = 0;

        for id in model.local_ids() {
            if model.is_blocked(id) {
                continue;
            }
            let Some(index) = model.get(id).decl_index() else {
                continue;
            };

            let cx = TransformContext {
                model: &*model,
                id,
                slot_budget: self.slot_budget,
            };
            let mut scratch = module.classes[index].clone();
            let mut failure = None;
            for pass in &self.passes {
                tracing::debug!("applying {} to '{}'", pass.name(), scratch.name);
                if let Err(diagnostic) = pass.apply(&cx, &mut scratch) {
                    failure = Some(diagnostic);
                    break;
                }
            }

            match failure {
                None => {
                    module.classes[index] = scratch;
                    woven += 1;
                }
                Some(diagnostic) => {
                    let name = model.get(id).name.clone();
                    model.mark_failed(id);
                    sink.emit(diagnostic.with_class(name))?;
                }
            }
        }

        Ok(woven)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{Member, MethodKind};
    use crate::diagnostic::Code;
    use crate::extract::extract;
    use crate::implicit::derive_implicit_columns;
    use crate::parser::Parser;
    use crate::resolve::NoReferences;

    fn weave(yaml: &str, budget: usize) -> (Module, SchemaModel, Vec<Diagnostic>) {
        let mut module = Parser::new().parse_yaml(yaml).unwrap();
        let mut diagnostics = Vec::new();
        let mut model = extract(&module, "fp", &NoReferences, &mut diagnostics).unwrap();
        derive_implicit_columns(&mut model, &mut diagnostics).unwrap();
        TransformEngine::new(budget)
            .run(&mut module, &mut model, &mut diagnostics)
            .unwrap();
        (module, model, diagnostics)
    }

    const FLEET: &str = r#"
module: fleet
classes:
  - name: fleet.Vehicle
    entity: true
    members:
      - field: { name: wheels, type: i32 }
      - field: { name: _color, type: String }
      - property: { name: color, type: String, backing: _color }
  - name: fleet.Car
    entity: true
    extends: fleet.Vehicle
    members:
      - field: { name: doors, type: i32 }
  - name: fleet.Helper
    members:
      - field: { name: x, type: i32 }
"#;

    #[test]
    fn test_pass_order() {
        assert_eq!(
            TransformEngine::new(64).passes(),
            ["implicit_columns", "storage_layout", "reroute", "identity_equality"]
        );
    }

    #[test]
    fn test_weave_hierarchy() {
        let (module, _, diagnostics) = weave(FLEET, 64);
        assert!(diagnostics.is_empty());

        let vehicle = module.class("fleet.Vehicle").unwrap();
        let names: Vec<_> = vehicle.members.iter().map(Member::name).collect();
        assert_eq!(
            names,
            [
                "__id",
                "__type",
                "__type_name",
                "__inherits",
                "wheels",
                "color",
                "equals",
                "hash_code"
            ]
        );
        assert_eq!(vehicle.storage.as_ref().unwrap().slots.len(), 6);

        let car = module.class("fleet.Car").unwrap();
        let storage = car.storage.as_ref().unwrap();
        assert_eq!(storage.inherited, 6);
        assert_eq!(storage.slot_of("doors"), Some(6));
        assert!(car.method(MethodKind::Equality).is_none());

        assert!(module.class("fleet.Helper").unwrap().storage.is_none());
    }

    #[test]
    fn test_budget_failure_leaves_class_untouched() {
        let (module, model, diagnostics) = weave(FLEET, 5);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, Code::SlotBudgetExceeded);
        assert_eq!(diagnostics[0].class.as_deref(), Some("fleet.Vehicle"));

        let vehicle = module.class("fleet.Vehicle").unwrap();
        assert!(vehicle.storage.is_none());
        assert_eq!(vehicle.members.len(), 3);
        assert!(model.get(model.lookup("fleet.Vehicle").unwrap()).failed);
        // Blocked by its failed base
        assert!(module.class("fleet.Car").unwrap().storage.is_none());
    }
}
