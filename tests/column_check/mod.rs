use crosstab::test_utils::wait_until;
use crosstab::CellRef;
use crosstab::ChangeCache;
use crosstab::RangeRef;

use crate::common::Harness;

/// Row 5 holds `Topic=cats`, unchanged from its baseline, and an empty
/// `Summary`. The first column check fills `Summary!B6`.
#[tokio::test]
async fn test_column_check_fills_empty_destination_of_unchanged_row() {
    let h = Harness::new(&[
        &["Topic", "Summary"],
        &["dogs", "done"],
        &["birds", "done"],
        &["fish", "done"],
        &["mice", "done"],
        &["cats", ""],
    ]);
    let cache = ChangeCache::new(h.store.clone(), h.config.cache.key_prefix.clone());
    cache.set(5, "Topic", "cats").await.unwrap();

    let mut engine = h.engine().await;
    let seed = engine.run_cycle().await.unwrap();
    assert!(seed.seeded.is_some());
    assert_eq!(engine.stats().snapshot().successful_completions, 0);

    let report = engine.run_cycle().await.unwrap();
    assert!(report.column_check);
    assert_eq!(report.triggers, 1);
    assert!(wait_until(|| engine.in_flight() == 0).await);

    let summary = CellRef::new(5, 1);
    assert_eq!(RangeRef::new("Sheet1", summary).to_string(), "Sheet1!B6");
    let writes = h.sheet.writes_to(summary);
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], "");
    assert_eq!(writes[1], "generated: Summarise cats");
    assert_eq!(h.sheet.cell(5, 1), "generated: Summarise cats");

    assert_eq!(engine.stats().snapshot().successful_completions, 1);
    assert!(wait_until(|| h.sink.latest().is_some_and(|s| s.successful_completions == 1)).await);

    // filled now, so the next cycles leave it alone
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.triggers, 0);
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rows_without_trigger_data_are_never_filled() {
    let h = Harness::new(&[&["Topic", "Summary"], &["", ""], &["cats", "done"]]);
    let mut engine = h.engine().await;
    engine.run_cycle().await.unwrap();

    let report = engine.run_cycle().await.unwrap();
    assert!(report.column_check);
    assert_eq!(report.triggers, 0);
    assert_eq!(h.completion.calls(), 0);
    engine.shutdown().await.unwrap();
}
