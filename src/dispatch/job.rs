use std::sync::Arc;

use crate::CellRef;
use crate::RangeRef;
use crate::RowSnapshot;
use crate::Rule;
use crate::Trigger;
use crate::TriggerReason;

/// One fired (row, rule) pair, self-contained so it outlives the poll cycle
/// that produced it.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub sheet: String,
    pub row: RowSnapshot,
    pub rule: Arc<Rule>,
    pub reason: TriggerReason,
    pub destination: CellRef,
}

impl GenerationJob {
    /// `None` when the rule's destination column is not in the row's header
    pub fn new(
        sheet: impl Into<String>,
        row: RowSnapshot,
        trigger: Trigger,
    ) -> Option<Self> {
        let destination = row.cell(&trigger.rule.destination)?;
        Some(Self {
            sheet: sheet.into(),
            row,
            rule: trigger.rule,
            reason: trigger.reason,
            destination,
        })
    }

    pub fn range(&self) -> RangeRef {
        RangeRef::new(self.sheet.clone(), self.destination)
    }
}
