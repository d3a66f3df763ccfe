use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;
use tracing::warn;

use super::Rule;

/// Immutable, name-ordered set of rules.
///
/// At most one active rule targets a given destination column: when several
/// do, the rule whose name sorts first is kept and the others are dropped.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, Arc<Rule>>,
}

impl RuleSet {
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        let by_name: BTreeMap<String, Rule> =
            rules.into_iter().map(|r| (r.name.clone(), r)).collect();

        let mut claimed: HashMap<String, String> = HashMap::new();
        let mut kept = BTreeMap::new();
        for (name, rule) in by_name {
            if !rule.is_inert() {
                if let Some(owner) = claimed.get(&rule.destination) {
                    warn!(
                        rule = %name,
                        destination = %rule.destination,
                        "destination column already written by rule '{}', rule dropped",
                        owner
                    );
                    continue;
                }
                claimed.insert(rule.destination.clone(), name.clone());
            }
            kept.insert(name, Arc::new(rule));
        }

        Self { rules: kept }
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Arc<Rule>> {
        self.rules.get(name)
    }

    /// All rules, inert ones included, in name order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values()
    }

    /// Rules that can fire, in name order
    pub fn active(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values().filter(|r| !r.is_inert())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Process-wide holder of the current rule set.
///
/// Reloads replace the whole set; a reader holding the previous `Arc` keeps a
/// consistent view until it drops it.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    current: ArcSwap<RuleSet>,
}

impl RuleRegistry {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(rules),
        }
    }

    pub fn load(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    pub fn replace(
        &self,
        rules: RuleSet,
    ) {
        info!(
            total = rules.len(),
            active = rules.active().count(),
            "rule set replaced"
        );
        self.current.store(Arc::new(rules));
    }
}
