//! Identity-based equality synthesis

use super::{ClassTransform, TransformContext};
use crate::decl::{ClassDecl, Member, MethodDecl, MethodKind, SynthesizedBody};
use crate::diagnostic::{Code, Diagnostic};

/// Name of the synthesized equality method
pub const EQUALS: &str = "equals";

/// Name of the synthesized hash method
pub const HASH_CODE: &str = "hash_code";

/// Adds `equals` and `hash_code` to root classes without user equality
///
/// A class whose base was woven in another module gets the base's
/// synthesized pair re-declared, since lookups never leave the module.
///
/// `equals` returns false for objects without an identity column, true for
/// the same object, and otherwise compares identity values. The reference
/// check comes first: an unsaved instance has no meaningful identity yet.
/// `hash_code` hashes the identity value. Derived classes inherit both.
pub struct IdentityEquality;

impl ClassTransform for IdentityEquality {
    fn name(&self) -> &'static str {
        "identity_equality"
    }

    fn apply(&self, cx: &TransformContext<'_>, class: &mut ClassDecl) -> Result<(), Diagnostic> {
        let entity = cx.entity();
        if entity.has_user_equality {
            return Ok(());
        }

        let body = if entity.is_root {
            let Some(identity_slot) = cx.model.identity_slot(cx.id) else {
                return Err(Diagnostic::error(
                    Code::SlotBudgetExceeded,
                    "root class has no storage slot for its identity column",
                ));
            };
            SynthesizedBody { identity_slot }
        } else if let Some(body) = cx.model.external_equality(cx.id) {
            body
        } else {
            return Ok(());
        };

        for (name, kind) in [(EQUALS, MethodKind::Equality), (HASH_CODE, MethodKind::Hash)] {
            class.members.push(Member::Method {
                method: MethodDecl {
                    name: name.to_string(),
                    kind,
                    body: None,
                    synthesized: Some(body),
                },
            });
        }
        Ok(())
    }
}
