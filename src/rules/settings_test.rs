use std::time::Duration;

use serde_json::json;
use tracing_test::traced_test;

use super::*;
use crate::test_utils::table;
use crate::RateQuota;

#[test]
fn test_parse_globals_and_rules() {
    let settings = SheetSettings::parse(&table(&[
        &["SHEET_NAME", "Leads"],
        &["SHEET_REFRESH_FREQUENCY", "2.5"],
        &["SHEET_NEW_COLUMNS_FREQUENCY", "30"],
        &["GPT_RATE_LIMIT", "20"],
        &["SHEETS_RATE_LIMIT", "50"],
        &["STATS", "TRUE"],
        &["OWNER", "ops team"],
        &["VAR1_TRIGGER_COL", "Topic, Tone"],
        &["VAR1_SYSTEM_MESSAGE", "You write about {Topic}"],
        &["VAR1_USER_MESSAGE", "Summarise {Topic} in a {Tone} tone"],
        &["VAR1_TEMP", "0.7"],
        &["VAR1_MAX_TOKENS", "256"],
        &["VAR1_PROMPT_COL_TO", "Summary"],
    ]));

    let t = &settings.tunables;
    assert_eq!(t.sheet_name.as_deref(), Some("Leads"));
    assert_eq!(t.refresh_interval, Some(Duration::from_millis(2500)));
    assert_eq!(t.column_check_interval, Some(Duration::from_secs(30)));
    assert_eq!(t.completion_quota, Some(RateQuota::new(20, 20)));
    assert_eq!(t.source_quota, Some(RateQuota::new(50, 50)));
    assert!(t.stats_enabled);
    assert_eq!(t.extras.get("OWNER").map(String::as_str), Some("ops team"));

    let rule = settings.rules.get("VAR1").unwrap();
    assert_eq!(rule.trigger_columns, vec!["Topic".to_string(), "Tone".to_string()]);
    assert_eq!(rule.system_message, "You write about {Topic}");
    assert_eq!(rule.temperature, 0.7);
    assert_eq!(rule.max_tokens, 256);
    assert_eq!(rule.destination, "Summary");
    assert!(!rule.is_inert());
}

#[test]
#[traced_test]
fn test_malformed_rule_field_leaves_rule_inert() {
    let settings = SheetSettings::parse(&table(&[
        &["VAR1_TRIGGER_COL", "Topic"],
        &["VAR1_SYSTEM_MESSAGE", "s"],
        &["VAR1_USER_MESSAGE", "u"],
        &["VAR1_TEMP", "warm"],
        &["VAR1_MAX_TOKENS", "100"],
        &["VAR1_PROMPT_COL_TO", "Summary"],
    ]));

    let rule = settings.rules.get("VAR1").unwrap();
    assert_eq!(rule.temperature, 0.0);
    assert!(rule.is_inert());
    assert!(logs_contain("TEMP is not a float"));
}

#[test]
fn test_malformed_globals_fall_back() {
    let settings = SheetSettings::parse(&table(&[
        &["SHEET_REFRESH_FREQUENCY", "soon"],
        &["SHEET_NEW_COLUMNS_FREQUENCY", "-5"],
        &["GPT_RATE_LIMIT", "0"],
        &["SHEETS_RATE_LIMIT", "fast"],
        &["STATS", "maybe"],
        &["SHEET_NAME", "   "],
    ]));

    assert_eq!(settings.tunables, Tunables::default());
}

#[test]
#[traced_test]
fn test_unrepresentable_intervals_are_ignored() {
    let settings = SheetSettings::parse(&table(&[
        &["SHEET_REFRESH_FREQUENCY", "1e30"],
        &["SHEET_NEW_COLUMNS_FREQUENCY", "inf"],
        &["SHEET_NAME", "Leads"],
    ]));

    assert_eq!(settings.tunables.refresh_interval, None);
    assert_eq!(settings.tunables.column_check_interval, None);
    assert_eq!(settings.tunables.sheet_name.as_deref(), Some("Leads"));
    assert!(logs_contain("is not a positive number of seconds"));
}

#[test]
fn test_short_and_non_string_rows_are_skipped() {
    let raw = vec![
        vec![json!("STATS")],
        vec![json!(12), json!("x")],
        vec![],
        vec![json!("GPT_RATE_LIMIT"), json!(15)],
        vec![json!("VAR1_MAX_TOKENS"), json!([1, 2])],
    ];
    let settings = SheetSettings::parse(&raw);

    assert!(!settings.tunables.stats_enabled);
    // numeric cells are read as text
    assert_eq!(settings.tunables.completion_quota, Some(RateQuota::new(15, 15)));
    assert!(settings.rules.is_empty());
}

#[test]
fn test_rule_key_without_property_is_ignored() {
    let settings = SheetSettings::parse(&table(&[&["VAR1", "x"], &["VAR2_UNKNOWN", "y"]]));

    assert!(settings.rules.get("VAR1").is_none());
    // an unknown property still declares the rule, which stays inert
    assert!(settings.rules.get("VAR2").unwrap().is_inert());
}

#[test]
fn test_rules_sharing_destination_keep_first_name() {
    let rows: Vec<[String; 2]> = ["VAR1", "VAR2"]
        .iter()
        .flat_map(|name| {
            vec![
                [format!("{name}_TRIGGER_COL"), "Topic".to_string()],
                [format!("{name}_SYSTEM_MESSAGE"), "s".to_string()],
                [format!("{name}_USER_MESSAGE"), "u".to_string()],
                [format!("{name}_TEMP"), "1".to_string()],
                [format!("{name}_MAX_TOKENS"), "10".to_string()],
                [format!("{name}_PROMPT_COL_TO"), "Summary".to_string()],
            ]
        })
        .collect();
    let raw: crate::Table = rows
        .iter()
        .map(|[k, v]| vec![json!(k), json!(v)])
        .collect();

    let settings = SheetSettings::parse(&raw);
    let names: Vec<_> = settings.rules.active().map(|r| r.name.clone()).collect();
    assert_eq!(names, vec!["VAR1".to_string()]);
}
