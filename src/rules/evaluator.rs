use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::Rule;
use super::RuleSet;
use crate::ChangeCache;
use crate::RowSnapshot;

/// Why a rule fired for a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Every trigger column changed since its baseline
    Changed,
    /// Trigger data present but destination empty during a column check
    MissingDestination,
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub rule: Arc<Rule>,
    pub reason: TriggerReason,
}

/// Decides which rules fire for a row snapshot.
pub struct RuleEvaluator {
    cache: Arc<ChangeCache>,
}

impl RuleEvaluator {
    pub fn new(cache: Arc<ChangeCache>) -> Self {
        Self { cache }
    }

    /// Evaluates every rule against one row.
    ///
    /// Each trigger column is compared against its baseline at most once per
    /// call, so rules sharing a trigger column observe the same change. A
    /// rule whose trigger values are not all present never touches the cache.
    /// Cache failures count as "unchanged" for that column.
    pub async fn evaluate(
        &self,
        row: &RowSnapshot,
        rules: &RuleSet,
        check_missing_destinations: bool,
    ) -> Vec<Trigger> {
        let mut changed: HashMap<&str, bool> = HashMap::new();
        let mut triggers = Vec::new();

        for rule in rules.active() {
            if !rule.trigger_columns.iter().all(|c| row.has_value(c)) {
                continue;
            }
            if row.cell(&rule.destination).is_none() {
                warn!(
                    row = row.row_index(),
                    rule = %rule.name,
                    "destination column '{}' not found in header",
                    rule.destination
                );
                continue;
            }

            let mut changed_count = 0;
            for column in &rule.trigger_columns {
                let did_change = match changed.get(column.as_str()).copied() {
                    Some(c) => c,
                    None => {
                        let c = self.column_changed(row, column).await;
                        changed.insert(column.as_str(), c);
                        c
                    }
                };
                if did_change {
                    changed_count += 1;
                }
            }

            let reason = if changed_count == rule.trigger_columns.len() {
                debug!(row = row.row_index(), rule = %rule.name, "change triggered rule");
                TriggerReason::Changed
            } else if check_missing_destinations && !row.has_value(&rule.destination) {
                debug!(
                    row = row.row_index(),
                    rule = %rule.name,
                    "row is missing value in destination column '{}'",
                    rule.destination
                );
                TriggerReason::MissingDestination
            } else {
                continue;
            };

            triggers.push(Trigger {
                rule: rule.clone(),
                reason,
            });
        }

        triggers
    }

    async fn column_changed(
        &self,
        row: &RowSnapshot,
        column: &str,
    ) -> bool {
        let value = row.get(column).unwrap_or_default();
        match self.cache.has_changed(row.row_index(), column, value).await {
            Ok(changed) => changed,
            Err(e) => {
                warn!(row = row.row_index(), column, "baseline lookup failed: {:?}", e);
                false
            }
        }
    }
}
