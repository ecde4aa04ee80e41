//! Type tower validation
//!
//! `kind` edges say which entity types the instances of a class. Following
//! them must end at a fixpoint: a class that is its own kind, the implicit
//! built-in `Type` root (no `kind`), or a class woven in another module.

use crate::diagnostic::{Code, Diagnostic, DiagnosticSink, Halted};
use crate::resolve::ModuleResolver;
use crate::schema::{ClassId, SchemaModel};

/// Longest `kind` chain accepted before a tower counts as unterminated
pub const MAX_TOWER_HOPS: usize = 16;

/// Where a `kind` chain ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TowerEnd {
    /// Implicit built-in `Type` root
    BuiltinRoot,
    /// Class that is its own kind
    Fixpoint(String),
    /// Class woven in a referenced module
    External(String),
    /// The chain revisits a class
    Cycle(Vec<String>),
    /// The chain reaches a name that is not an entity anywhere
    Unknown(String),
    /// The chain is longer than [`MAX_TOWER_HOPS`]
    TooLong,
}

/// Follow the `kind` chain of one class
pub fn walk(model: &SchemaModel, resolver: &dyn ModuleResolver, start: ClassId) -> TowerEnd {
    let mut path = vec![model.get(start).name.clone()];
    let mut current = start;

    for _ in 0..MAX_TOWER_HOPS {
        let class = model.get(current);
        let Some(kind) = class.kind.as_deref() else {
            return TowerEnd::BuiltinRoot;
        };
        if kind == class.name {
            return TowerEnd::Fixpoint(class.name.clone());
        }

        match model.lookup(kind) {
            Some(next) if model.get(next).is_external() => {
                return TowerEnd::External(kind.to_string());
            }
            Some(next) => {
                if path.iter().any(|seen| seen == kind) {
                    path.push(kind.to_string());
                    return TowerEnd::Cycle(path);
                }
                path.push(kind.to_string());
                current = next;
            }
            None => {
                return match resolver.resolve(kind) {
                    Some(_) => TowerEnd::External(kind.to_string()),
                    None => TowerEnd::Unknown(kind.to_string()),
                };
            }
        }
    }

    TowerEnd::TooLong
}

/// Check that every local entity's type tower terminates
pub fn validate(
    model: &mut SchemaModel,
    resolver: &dyn ModuleResolver,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), Halted> {
    for id in model.local_ids() {
        if model.is_blocked(id) {
            continue;
        }

        let name = model.get(id).name.clone();
        let diagnostic = match walk(model, resolver, id) {
            TowerEnd::BuiltinRoot | TowerEnd::Fixpoint(_) | TowerEnd::External(_) => continue,
            TowerEnd::Cycle(path) => Diagnostic::error(
                Code::TypeTowerCycle,
                format!(
                    "type tower of '{name}' loops without reaching a root: {}",
                    path.join(" -> ")
                ),
            ),
            TowerEnd::Unknown(kind) => Diagnostic::error(
                Code::TypeTowerUnterminated,
                format!("type tower of '{name}' reaches '{kind}', which is not an entity class"),
            ),
            TowerEnd::TooLong => Diagnostic::error(
                Code::TypeTowerUnterminated,
                format!(
                    "type tower of '{name}' does not reach a root within {MAX_TOWER_HOPS} hops"
                ),
            ),
        };

        sink.emit(diagnostic.with_class(&name))?;
        model.mark_failed(id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::SlotDecl;
    use crate::extract::extract;
    use crate::parser::Parser;
    use crate::resolve::{NoReferences, StubClass, StubIndex};
    use crate::schema::Role;

    fn model(yaml: &str) -> SchemaModel {
        let module = Parser::new().parse_yaml(yaml).unwrap();
        extract(&module, "fp", &NoReferences, &mut Vec::new()).unwrap()
    }

    fn end_of(model: &SchemaModel, class: &str) -> TowerEnd {
        walk(model, &NoReferences, model.lookup(class).unwrap())
    }

    #[test]
    fn test_tower_ends() {
        let model = model(r#"
module: m
classes:
  - name: m.VehicleType
    entity: true
    kind: m.VehicleType
  - name: m.Vehicle
    entity: true
    kind: m.VehicleType
  - name: m.Plain
    entity: true
"#);
        assert_eq!(
            end_of(&model, "m.Vehicle"),
            TowerEnd::Fixpoint("m.VehicleType".to_string())
        );
        assert_eq!(end_of(&model, "m.Plain"), TowerEnd::BuiltinRoot);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut model = model(r#"
module: m
classes:
  - name: m.A
    entity: true
    kind: m.B
  - name: m.B
    entity: true
    kind: m.A
  - name: m.C
    entity: true
"#);
        let mut diagnostics = Vec::new();
        validate(&mut model, &NoReferences, &mut diagnostics).unwrap();

        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.code == Code::TypeTowerCycle));
        assert!(diagnostics[0].message.contains("m.A -> m.B -> m.A"));
        assert!(!model.get(model.lookup("m.C").unwrap()).failed);
    }

    #[test]
    fn test_unknown_and_plain_kind_targets() {
        let mut model = model(r#"
module: m
classes:
  - name: m.Helper
  - name: m.A
    entity: true
    kind: m.Helper
  - name: m.B
    entity: true
    kind: m.Nowhere
"#);
        let mut diagnostics = Vec::new();
        validate(&mut model, &NoReferences, &mut diagnostics).unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert!(
            diagnostics
                .iter()
                .all(|d| d.code == Code::TypeTowerUnterminated)
        );
    }

    #[test]
    fn test_long_chain_is_unterminated() {
        let mut yaml = String::from("module: m\nclasses:\n");
        for i in 0..=MAX_TOWER_HOPS + 1 {
            yaml.push_str(&format!(
                "  - name: m.K{i}\n    entity: true\n    kind: m.K{}\n",
                i + 1
            ));
        }
        yaml.push_str(&format!(
            "  - name: m.K{n}\n    entity: true\n    kind: m.K{n}\n",
            n = MAX_TOWER_HOPS + 2
        ));
        let model = model(&yaml);
        assert_eq!(end_of(&model, "m.K0"), TowerEnd::TooLong);
        assert_eq!(
            end_of(&model, "m.K3"),
            TowerEnd::Fixpoint(format!("m.K{}", MAX_TOWER_HOPS + 2))
        );
    }

    #[test]
    fn test_external_kind_terminates() {
        let mut index = StubIndex::new();
        index.insert(StubClass {
            name: "core.Type".to_string(),
            module: "core".to_string(),
            slots: vec![SlotDecl {
                index: 0,
                name: "__id".to_string(),
                ty: "i64".to_string(),
                role: Role::IdentityColumn,
            }],
            equality: None,
        });
        let model = model(r#"
module: m
classes:
  - name: m.A
    entity: true
    kind: core.Type
"#);
        assert_eq!(
            walk(&model, &index, model.lookup("m.A").unwrap()),
            TowerEnd::External("core.Type".to_string())
        );
    }
}
