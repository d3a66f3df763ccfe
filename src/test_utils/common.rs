use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::BackoffPolicy;
use crate::ColumnMap;
use crate::CrosstabConfig;
use crate::RateQuota;
use crate::RowSnapshot;
use crate::Rule;
use crate::Table;

pub fn enable_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Raw table from string cells, header first
pub fn table(rows: &[&[&str]]) -> Table {
    rows.iter()
        .map(|row| row.iter().map(|v| Value::String(v.to_string())).collect())
        .collect()
}

/// Row snapshot at `row_index` under the given header
pub fn row_of(
    row_index: usize,
    header: &[&str],
    values: &[&str],
) -> RowSnapshot {
    let header: Vec<Value> = header.iter().map(|h| Value::String(h.to_string())).collect();
    let raw: Vec<Value> = values.iter().map(|v| Value::String(v.to_string())).collect();
    RowSnapshot::build(row_index, Arc::new(ColumnMap::from_header(&header)), &raw)
}

/// Complete, active rule writing about its first trigger column
pub fn test_rule(
    name: &str,
    triggers: &[&str],
    destination: &str,
) -> Rule {
    let subject = triggers.first().copied().unwrap_or("Topic");
    Rule {
        name: name.to_string(),
        trigger_columns: triggers.iter().map(|t| t.to_string()).collect(),
        system_message: "You are a concise writer.".to_string(),
        user_message: format!("Write about {{{subject}}}"),
        temperature: 0.7,
        max_tokens: 100,
        destination: destination.to_string(),
    }
}

/// Defaults with generous rate limits and millisecond retry delays
pub fn test_config() -> CrosstabConfig {
    let mut config = CrosstabConfig::default();
    config.rate_limit.source = RateQuota::new(60_000, 1_000);
    config.rate_limit.completion = RateQuota::new(60_000, 1_000);
    config.rate_limit.max_wait_ms = 5_000;
    let fast = BackoffPolicy {
        max_retries: 3,
        timeout_ms: 1_000,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    config.retry.write = fast;
    config.retry.stats = fast;
    config.dispatch.generation_pool_size = 4;
    config.dispatch.write_pool_size = 8;
    config.dispatch.drain_timeout_ms = 2_000;
    config.completion.request_timeout_ms = 2_000;
    config
}

/// Rule-definition table for one rule, followed by `extra` global rows
pub fn rule_settings(
    name: &str,
    triggers: &str,
    user_message: &str,
    destination: &str,
    extra: &[(&str, &str)],
) -> Table {
    let mut rows: Vec<[String; 2]> = vec![
        [format!("{name}_TRIGGER_COL"), triggers.to_string()],
        [format!("{name}_SYSTEM_MESSAGE"), "You are a concise writer.".to_string()],
        [format!("{name}_USER_MESSAGE"), user_message.to_string()],
        [format!("{name}_TEMP"), "0.7".to_string()],
        [format!("{name}_MAX_TOKENS"), "100".to_string()],
        [format!("{name}_PROMPT_COL_TO"), destination.to_string()],
    ];
    rows.extend(extra.iter().map(|(k, v)| [k.to_string(), v.to_string()]));
    rows.into_iter()
        .map(|row| row.into_iter().map(Value::String).collect())
        .collect()
}

/// Polls `condition` every few milliseconds for up to two seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
