use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use crosstab::column_number;
use crosstab::test_utils::rule_settings;
use crosstab::test_utils::test_config;
use crosstab::test_utils::InMemorySheet;
use crosstab::test_utils::MemoryStatsSink;
use crosstab::test_utils::ScriptedCompletion;
use crosstab::CacheStore;
use crosstab::CrosstabConfig;
use crosstab::Engine;
use crosstab::EngineBuilder;
use crosstab::MemCacheStore;
use crosstab::RangeRef;
use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use warp::http::StatusCode;
use warp::Filter;

pub const SUMMARY_RULE: &str = "Summarise {Topic}";

/// In-process collaborators wired into one engine
pub struct Harness {
    pub sheet: Arc<InMemorySheet>,
    pub completion: Arc<ScriptedCompletion>,
    pub sink: Arc<MemoryStatsSink>,
    pub store: Arc<dyn CacheStore>,
    pub config: CrosstabConfig,
}

impl Harness {
    pub fn new(rows: &[&[&str]]) -> Self {
        Self::with_store(rows, Arc::new(MemCacheStore::new()))
    }

    pub fn with_store(
        rows: &[&[&str]],
        store: Arc<dyn CacheStore>,
    ) -> Self {
        let sheet = Arc::new(InMemorySheet::new("Sheet1", rows));
        sheet.set_settings(rule_settings(
            "VAR1",
            "Topic",
            SUMMARY_RULE,
            "Summary",
            &[("STATS", "true")],
        ));
        Self {
            sheet,
            completion: Arc::new(ScriptedCompletion::echo()),
            sink: Arc::new(MemoryStatsSink::default()),
            store,
            config: test_config(),
        }
    }

    pub async fn engine(&self) -> Engine {
        EngineBuilder::new(self.config.clone())
            .data_source(self.sheet.clone())
            .settings_source(self.sheet.clone())
            .completion(self.completion.clone())
            .cache_store(self.store.clone())
            .stats_sink(self.sink.clone())
            .build()
            .await
            .unwrap()
    }
}

#[derive(Debug, Default)]
pub struct FakeApiState {
    pub sheets: HashMap<String, Vec<Vec<String>>>,
    pub settings: Vec<Vec<String>>,
    pub prompts: Vec<String>,
    /// Sheets added through `batchUpdate`
    pub created: Vec<String>,
    /// Ranges emptied through `values:clear`
    pub cleared: Vec<String>,
}

impl FakeApiState {
    pub fn cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
    ) -> String {
        self.sheets
            .get(sheet)
            .and_then(|g| g.get(row))
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or_default()
    }
}

pub type FakeApi = Arc<Mutex<FakeApiState>>;

/// Serves the spreadsheet endpoints under `/v4` and chat completions under
/// `/v1` from one in-memory state.
pub fn spawn_fake_api(state: FakeApi) -> SocketAddr {
    let listing = state.clone();
    let get_spreadsheet = warp::get()
        .and(warp::path!("v4" / "spreadsheets" / String))
        .map(move |_id: String| {
            let sheets: Vec<Value> = listing
                .lock()
                .sheets
                .keys()
                .map(|title| json!({"properties": {"title": title}}))
                .collect();
            warp::reply::json(&json!({ "sheets": sheets }))
        });

    let adds = state.clone();
    let batch_update = warp::post()
        .and(warp::path!("v4" / "spreadsheets" / String))
        .and(warp::body::json())
        .map(move |_id: String, body: Value| {
            let mut state = adds.lock();
            for request in body["requests"].as_array().cloned().unwrap_or_default() {
                if let Some(title) = request["addSheet"]["properties"]["title"].as_str() {
                    state.sheets.entry(title.to_string()).or_default();
                    state.created.push(title.to_string());
                }
            }
            warp::reply::json(&json!({}))
        });

    let clears = state.clone();
    let clear_values = warp::post()
        .and(warp::path!("v4" / "spreadsheets" / String / "values" / String))
        .map(move |_id: String, range: String| {
            let range = range.replace("%20", " ");
            let Some(span) = range.strip_suffix(":clear") else {
                return StatusCode::NOT_FOUND;
            };
            let Some((sheet, columns)) = span.split_once('!') else {
                return StatusCode::BAD_REQUEST;
            };
            let Some((first, last)) = columns
                .split_once(':')
                .and_then(|(a, b)| Some((column_number(a)? - 1, column_number(b)? - 1)))
            else {
                return StatusCode::BAD_REQUEST;
            };
            let mut state = clears.lock();
            state.cleared.push(span.to_string());
            let Some(grid) = state.sheets.get_mut(sheet) else {
                return StatusCode::BAD_REQUEST;
            };
            for row in grid.iter_mut() {
                for value in row.iter_mut().skip(first).take(last + 1 - first) {
                    value.clear();
                }
            }
            StatusCode::OK
        });

    let reads = state.clone();
    let get_values = warp::get()
        .and(warp::path::full())
        .map(move |path: warp::path::FullPath| {
            let range = values_range(path.as_str());
            let state = reads.lock();
            let rows = if range.starts_with("Settings!") {
                Some(state.settings.clone())
            } else {
                state.sheets.get(&range).cloned()
            };
            match rows {
                Some(values) => warp::reply::with_status(
                    warp::reply::json(&json!({"range": range, "values": values})),
                    StatusCode::OK,
                ),
                None => warp::reply::with_status(
                    warp::reply::json(&json!({"error": {"message": "Unable to parse range"}})),
                    StatusCode::BAD_REQUEST,
                ),
            }
        });

    let writes = state.clone();
    let put_values = warp::put()
        .and(warp::path::full())
        .and(warp::body::json())
        .map(move |path: warp::path::FullPath, body: Value| {
            let range = values_range(path.as_str());
            let Ok(target) = RangeRef::from_str(&range) else {
                return StatusCode::BAD_REQUEST;
            };
            let mut state = writes.lock();
            let Some(grid) = state.sheets.get_mut(&target.sheet) else {
                return StatusCode::BAD_REQUEST;
            };
            let rows = body["values"].as_array().cloned().unwrap_or_default();
            for (dr, row) in rows.iter().enumerate() {
                for (dc, value) in row.as_array().cloned().unwrap_or_default().iter().enumerate() {
                    let (r, c) = (target.cell.row + dr, target.cell.col + dc);
                    if grid.len() <= r {
                        grid.resize_with(r + 1, Vec::new);
                    }
                    if grid[r].len() <= c {
                        grid[r].resize(c + 1, String::new());
                    }
                    grid[r][c] = value.as_str().unwrap_or_default().to_string();
                }
            }
            StatusCode::OK
        });

    let chats = state;
    let completions = warp::post()
        .and(warp::path!("v1" / "chat" / "completions"))
        .and(warp::body::json())
        .map(move |body: Value| {
            let prompt = body["messages"][1]["content"].as_str().unwrap_or_default().to_string();
            chats.lock().prompts.push(prompt.clone());
            warp::reply::json(&json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": format!("generated: {prompt}")}}]
            }))
        });

    let routes = get_spreadsheet
        .or(get_values)
        .or(put_values)
        .or(batch_update)
        .or(clear_values)
        .or(completions);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

/// Last path segment of `/v4/spreadsheets/{id}/values/{range}`
fn values_range(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().replace("%20", " ")
}
