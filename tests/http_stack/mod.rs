use std::sync::Arc;

use crosstab::test_utils::rule_settings;
use crosstab::test_utils::test_config;
use crosstab::test_utils::wait_until;
use crosstab::EngineBuilder;
use crosstab::STAT_SUCCESSFUL_COMPLETIONS;
use parking_lot::Mutex;

use crate::common::spawn_fake_api;
use crate::common::FakeApi;
use crate::common::FakeApiState;
use crate::common::SUMMARY_RULE;

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|v| v.to_string()).collect())
        .collect()
}

/// Default clients, sled cache and sheet stats sink against a fake HTTP API.
/// The stats sheet does not exist up front.
#[tokio::test]
async fn test_default_stack_round_trip_over_http() {
    let api: FakeApi = Arc::new(Mutex::new(FakeApiState::default()));
    {
        let mut state = api.lock();
        state
            .sheets
            .insert("Sheet1".into(), grid(&[&["Topic", "Summary"], &["cats", "done"]]));
        state.settings = rule_settings("VAR1", "Topic", SUMMARY_RULE, "Summary", &[("STATS", "true")])
            .into_iter()
            .map(|row| row.iter().map(|v| v.as_str().unwrap_or_default().to_string()).collect())
            .collect();
    }
    let addr = spawn_fake_api(api.clone());
    let dir = tempfile::tempdir().unwrap();

    let mut config = test_config();
    config.source.base_url = format!("http://{addr}/v4");
    config.source.spreadsheet_id = "sheet-id".into();
    config.source.access_token = "sheets-token".into();
    config.completion.base_url = format!("http://{addr}/v1");
    config.completion.api_key = "openai-key".into();
    config.cache.db_path = dir.path().join("cache");

    let mut engine = EngineBuilder::new(config).build().await.unwrap();
    assert!(engine.stats().is_enabled());
    assert_eq!(engine.run_cycle().await.unwrap().seeded, Some(2));

    api.lock().sheets.get_mut("Sheet1").unwrap()[1][0] = "lions".into();
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.triggers, 1);
    assert!(wait_until(|| engine.in_flight() == 0).await);

    {
        let state = api.lock();
        assert_eq!(state.cell("Sheet1", 1, 1), "generated: Summarise lions");
        assert_eq!(state.prompts, vec!["Summarise lions".to_string()]);
    }
    assert!(
        wait_until(|| {
            let state = api.lock();
            state.cell("Stats", 2, 0) == STAT_SUCCESSFUL_COMPLETIONS && state.cell("Stats", 2, 1) == "1"
        })
        .await
    );
    {
        let state = api.lock();
        assert_eq!(state.created, vec!["Stats".to_string()]);
        assert_eq!(state.cleared, vec!["Stats!A:B".to_string()]);
    }
    engine.shutdown().await.unwrap();
}
