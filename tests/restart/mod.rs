use std::sync::Arc;

use crosstab::test_utils::wait_until;
use crosstab::SledCacheStore;

use crate::common::Harness;

/// Baselines survive a restart: an edit made while the engine was down is
/// detected, and already-known cells are not re-seeded.
#[tokio::test]
async fn test_baselines_survive_restart() {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let store = Arc::new(SledCacheStore::from_db(db.clone()).unwrap());
    let h = Harness::with_store(&[&["Topic", "Summary"], &["cats", "done"], &["dogs", "done"]], store);

    let mut first = h.engine().await;
    assert_eq!(first.run_cycle().await.unwrap().seeded, Some(4));
    assert_eq!(first.run_cycle().await.unwrap().triggers, 0);
    first.shutdown().await.unwrap();

    h.sheet.set_cell(2, 0, "wolves");

    let mut second = h.engine().await;
    assert_eq!(second.run_cycle().await.unwrap().seeded, Some(0));
    let report = second.run_cycle().await.unwrap();
    assert_eq!(report.triggers, 1);
    assert!(wait_until(|| second.in_flight() == 0).await);
    assert_eq!(h.sheet.cell(2, 1), "generated: Summarise wolves");
    assert_eq!(h.sheet.cell(1, 1), "done");
    second.shutdown().await.unwrap();
}
