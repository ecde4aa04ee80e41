//! Attribute storage rerouting

use std::collections::HashSet;

use super::{ClassTransform, TransformContext};
use crate::decl::{ClassDecl, Member};
use crate::diagnostic::{Code, Diagnostic};

/// Routes user-defined property accessors through storage slots
///
/// The property's slot is its position in the flattened attribute list. Its
/// backing field is dropped from the declaration since storage now holds the
/// value. Runs after [`super::StorageLayoutPass`].
pub struct Reroute;

impl ClassTransform for Reroute {
    fn name(&self) -> &'static str {
        "reroute"
    }

    fn apply(&self, cx: &TransformContext<'_>, class: &mut ClassDecl) -> Result<(), Diagnostic> {
        let Some(storage) = class.storage.clone() else {
            return Ok(());
        };

        let fields: HashSet<String> = class
            .members
            .iter()
            .filter_map(|member| match member {
                Member::Field { field } => Some(field.name.clone()),
                _ => None,
            })
            .collect();

        let mut absorbed = HashSet::new();
        for member in &mut class.members {
            let Member::Property { property } = member else {
                continue;
            };
            let Some(backing) = property.backing.clone() else {
                continue;
            };
            if !fields.contains(&backing) {
                return Err(Diagnostic::error(
                    Code::MissingBackingField,
                    format!("backing field '{backing}' does not exist"),
                )
                .with_attribute(&property.name));
            }
            // The schema role includes one carried over from the backing field.
            let role = cx
                .entity()
                .attributes
                .iter()
                .find(|attribute| attribute.name == property.name)
                .map_or(property.role.unwrap_or_default(), |attribute| attribute.role);
            if !role.is_user_defined() {
                continue;
            }

            property.slot = storage.own_slot_of(&property.name);
            property.backing = None;
            absorbed.insert(backing);
        }

        class.members.retain(|member| match member {
            Member::Field { field } => !absorbed.contains(&field.name),
            _ => true,
        });
        Ok(())
    }
}
