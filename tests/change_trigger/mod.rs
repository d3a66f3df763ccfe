use crosstab::test_utils::rule_settings;
use crosstab::test_utils::wait_until;
use crosstab::CellRef;
use serde_json::Value;

use crate::common::Harness;

#[tokio::test]
async fn test_edited_trigger_cell_regenerates_destination() {
    let h = Harness::new(&[&["Topic", "Summary"], &["cats", "old summary"], &["dogs", "done"]]);
    let mut engine = h.engine().await;
    engine.run_cycle().await.unwrap();

    h.sheet.set_cell(1, 0, "tigers");
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.triggers, 1);
    assert!(wait_until(|| engine.in_flight() == 0).await);

    assert_eq!(
        h.sheet.writes_to(CellRef::new(1, 1)),
        vec!["".to_string(), "generated: Summarise tigers".to_string()]
    );
    let request = &h.completion.requests()[0];
    assert_eq!(request.system_message, "You are a concise writer.");
    assert_eq!(request.temperature, 0.7);
    assert_eq!(request.max_tokens, 100);

    // the engine's own write is not a trigger-column change
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.triggers, 0);
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rule_needs_every_trigger_column_to_change() {
    let h = Harness::new(&[&["Topic", "Tone", "Summary"], &["cats", "dry", "done"]]);
    let mut settings = rule_settings("VAR1", "Topic, Tone", "{Topic} in a {Tone} tone", "Summary", &[]);
    settings.push(vec![Value::String("STATS".into()), Value::String("false".into())]);
    h.sheet.set_settings(settings);
    let mut engine = h.engine().await;
    engine.run_cycle().await.unwrap();

    h.sheet.set_cell(1, 0, "dogs");
    assert_eq!(engine.run_cycle().await.unwrap().triggers, 0);

    h.sheet.set_cell(1, 0, "birds");
    h.sheet.set_cell(1, 1, "witty");
    assert_eq!(engine.run_cycle().await.unwrap().triggers, 1);
    assert!(wait_until(|| engine.in_flight() == 0).await);
    assert_eq!(h.sheet.cell(1, 2), "generated: birds in a witty tone");
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_write_back_is_counted_and_next_cycle_continues() {
    let h = Harness::new(&[&["Topic", "Summary"], &["cats", "done"], &["dogs", "done"]]);
    let mut engine = h.engine().await;
    engine.run_cycle().await.unwrap();

    // the marker write fails permanently, nothing is generated
    h.sheet.fail_next_writes(1, 403);
    h.sheet.set_cell(1, 0, "lions");
    engine.run_cycle().await.unwrap();
    assert!(wait_until(|| engine.in_flight() == 0).await);
    assert_eq!(h.completion.calls(), 0);
    assert_eq!(engine.stats().snapshot().errors, 1);

    h.sheet.set_cell(2, 0, "wolves");
    engine.run_cycle().await.unwrap();
    assert!(wait_until(|| engine.in_flight() == 0).await);
    assert_eq!(h.sheet.cell(2, 1), "generated: Summarise wolves");
    assert_eq!(h.sheet.cell(1, 1), "done");

    // stats reach the sink; the `STATS` setting enabled publication
    assert!(wait_until(|| h.sink.latest().is_some_and(|s| s.errors == 1 && s.successful_completions == 1)).await);
    engine.shutdown().await.unwrap();
}
