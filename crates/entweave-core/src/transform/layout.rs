//! Storage layout

use super::{ClassTransform, TransformContext};
use crate::decl::ClassDecl;
use crate::diagnostic::{Code, Diagnostic};

/// Attaches the flattened root-to-leaf slot layout to the class
///
/// A hierarchy that needs more slots than the budget cannot be stored, and
/// for a root that includes its identity column.
pub struct StorageLayoutPass;

impl ClassTransform for StorageLayoutPass {
    fn name(&self) -> &'static str {
        "storage_layout"
    }

    fn apply(&self, cx: &TransformContext<'_>, class: &mut ClassDecl) -> Result<(), Diagnostic> {
        let layout = cx.model.layout(cx.id);
        if layout.slots.len() > cx.slot_budget {
            return Err(Diagnostic::error(
                Code::SlotBudgetExceeded,
                format!(
                    "class needs {} storage slots but the hierarchy budget is {}",
                    layout.slots.len(),
                    cx.slot_budget
                ),
            ));
        }

        class.storage = Some(layout);
        Ok(())
    }
}
