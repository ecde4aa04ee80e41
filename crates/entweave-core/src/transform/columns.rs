//! Reserved column insertion

use super::{ClassTransform, TransformContext};
use crate::decl::{ClassDecl, FieldDecl, Member};
use crate::diagnostic::Diagnostic;

/// Inserts the reserved columns synthesized for a root class as fields at
/// the front of its members
pub struct ImplicitColumns;

impl ClassTransform for ImplicitColumns {
    fn name(&self) -> &'static str {
        "implicit_columns"
    }

    fn apply(&self, cx: &TransformContext<'_>, class: &mut ClassDecl) -> Result<(), Diagnostic> {
        let entity = cx.entity();
        if !entity.is_root {
            return Ok(());
        }

        let fields: Vec<Member> = entity
            .attributes
            .iter()
            .filter(|a| a.synthesized && !a.role.is_user_defined())
            .filter(|a| !class.members.iter().any(|m| m.name() == a.name))
            .map(|a| Member::Field {
                field: FieldDecl {
                    name: a.name.clone(),
                    ty: a.value_type.clone(),
                    role: Some(a.role),
                    synthesized: true,
                },
            })
            .collect();

        class.members.splice(0..0, fields);
        Ok(())
    }
}
