//! Parser for the flat key/value rule-definition table.
//!
//! Every malformed entry is logged and ignored: a bad value never aborts the
//! parse, it only leaves the affected rule inert or the affected tunable at
//! its configured default.
use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use tracing::warn;

use super::Rule;
use super::RuleSet;
use crate::cell_text;
use crate::constants::*;
use crate::RateQuota;
use crate::Table;

/// Global values read from the rule sheet. `None` means "keep the value from
/// configuration".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tunables {
    pub sheet_name: Option<String>,
    pub refresh_interval: Option<Duration>,
    pub column_check_interval: Option<Duration>,
    pub completion_quota: Option<RateQuota>,
    pub source_quota: Option<RateQuota>,
    pub stats_enabled: bool,
    /// Unrecognised global keys, kept verbatim
    pub extras: BTreeMap<String, String>,
}

/// Result of one rule-sheet load
#[derive(Debug, Clone, Default)]
pub struct SheetSettings {
    pub tunables: Tunables,
    pub rules: RuleSet,
}

impl SheetSettings {
    pub fn parse(table: &Table) -> Self {
        let mut tunables = Tunables::default();
        let mut rules: BTreeMap<String, Rule> = BTreeMap::new();

        for (line, row) in table.iter().enumerate() {
            if row.len() < 2 {
                continue;
            }
            let key = match &row[0] {
                Value::String(k) => k.trim(),
                other => {
                    warn!(line, "settings key is not a string: {:?}", other);
                    continue;
                }
            };
            let Some(value) = cell_text(&row[1]) else {
                warn!(line, key, "settings value is not a scalar: {:?}", row[1]);
                continue;
            };

            if key.starts_with(RULE_KEY_PREFIX) {
                parse_rule_entry(&mut rules, key, &value);
            } else {
                parse_global_entry(&mut tunables, key, value);
            }
        }

        debug!(rules = rules.len(), "parsed rule sheet");
        Self {
            tunables,
            rules: RuleSet::new(rules.into_values()),
        }
    }
}

fn parse_global_entry(
    tunables: &mut Tunables,
    key: &str,
    value: String,
) {
    match key {
        SETTING_SHEET_NAME => {
            let name = value.trim();
            if name.is_empty() {
                warn!("{} is empty, keeping configured sheet name", key);
            } else {
                tunables.sheet_name = Some(name.to_string());
            }
        }
        SETTING_REFRESH_FREQUENCY => tunables.refresh_interval = parse_seconds(key, &value),
        SETTING_COLUMN_CHECK_FREQUENCY => {
            tunables.column_check_interval = parse_seconds(key, &value)
        }
        SETTING_COMPLETION_RATE_LIMIT => {
            tunables.completion_quota = parse_rate(key, &value).map(RateQuota::per_minute)
        }
        SETTING_SOURCE_RATE_LIMIT => {
            tunables.source_quota = parse_rate(key, &value).map(RateQuota::per_minute)
        }
        SETTING_STATS => match parse_bool(&value) {
            Some(enabled) => tunables.stats_enabled = enabled,
            None => warn!("{} is not a bool. It is '{}'", key, value),
        },
        _ => {
            tunables.extras.insert(key.to_string(), value);
        }
    }
}

fn parse_rule_entry(
    rules: &mut BTreeMap<String, Rule>,
    key: &str,
    value: &str,
) {
    let Some((name, prop)) = key.split_once('_') else {
        warn!(key, "rule key has no property suffix, ignored");
        return;
    };

    let rule = rules.entry(name.to_string()).or_insert_with(|| Rule {
        name: name.to_string(),
        ..Default::default()
    });

    match prop {
        RULE_PROP_TRIGGER_COL => {
            rule.trigger_columns = value.split(',').map(|c| c.trim().to_string()).collect();
        }
        RULE_PROP_SYSTEM_MESSAGE => rule.system_message = value.to_string(),
        RULE_PROP_USER_MESSAGE => rule.user_message = value.to_string(),
        RULE_PROP_TEMP => match value.trim().parse::<f32>() {
            Ok(t) if t.is_finite() => rule.temperature = t,
            _ => warn!(rule = name, "{} is not a float. It is '{}'", prop, value),
        },
        RULE_PROP_MAX_TOKENS => match value.trim().parse::<u32>() {
            Ok(n) => rule.max_tokens = n,
            Err(_) => warn!(rule = name, "{} is not an int. It is '{}'", prop, value),
        },
        RULE_PROP_PROMPT_COL_TO => rule.destination = value.trim().to_string(),
        _ => warn!(rule = name, "unknown rule property '{}', ignored", prop),
    }
}

fn parse_seconds(
    key: &str,
    value: &str,
) -> Option<Duration> {
    match value.trim().parse::<f64>().map(Duration::try_from_secs_f64) {
        Ok(Ok(d)) if !d.is_zero() => Some(d),
        _ => {
            warn!("{} is not a positive number of seconds. It is '{}'", key, value);
            None
        }
    }
}

fn parse_rate(
    key: &str,
    value: &str,
) -> Option<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            warn!("{} is not a positive int. It is '{}'", key, value);
            None
        }
    }
}

/// Accepts the spellings a spreadsheet produces for booleans
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Some(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}
