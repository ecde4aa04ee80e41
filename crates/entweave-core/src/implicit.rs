//! Implicit column derivation
//!
//! Every root entity gets the four reserved columns unless a member already
//! fills the role. Derived classes inherit them through the storage layout.

use crate::diagnostic::{Code, Diagnostic, DiagnosticSink, Halted};
use crate::schema::{Attribute, Role, SchemaModel};

/// Reject user members named like reserved columns and synthesize the
/// missing reserved columns of every root class
///
/// A member may carry a reserved name only while filling that same role.
pub fn derive_implicit_columns(
    model: &mut SchemaModel,
    sink: &mut dyn DiagnosticSink,
) -> Result<(), Halted> {
    for id in model.local_ids() {
        if model.is_blocked(id) {
            continue;
        }

        let class = model.get(id);
        let collisions: Vec<(String, Role)> = class
            .attributes
            .iter()
            .filter_map(|attribute| {
                Role::for_reserved_name(&attribute.name)
                    .filter(|role| *role != attribute.role)
                    .map(|role| (attribute.name.clone(), role))
            })
            .collect();

        if !collisions.is_empty() {
            let class_name = class.name.clone();
            for (name, role) in collisions {
                sink.emit(
                    Diagnostic::error(
                        Code::ReservedNameCollision,
                        format!("member '{name}' uses the name reserved for the {role} column"),
                    )
                    .with_class(&class_name)
                    .with_attribute(&name),
                )?;
            }
            model.mark_failed(id);
            continue;
        }

        if !class.is_root {
            continue;
        }

        let missing: Vec<Attribute> = Role::RESERVED
            .into_iter()
            .filter(|role| !class.attributes.iter().any(|a| a.role == *role))
            .map(Attribute::reserved)
            .collect();

        if !missing.is_empty() {
            tracing::debug!(
                "synthesizing {} reserved columns for '{}'",
                missing.len(),
                class.name
            );
            let class = model.get_mut(id);
            class.attributes.splice(0..0, missing);
        }
    }

    Ok(())
}
