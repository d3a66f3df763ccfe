//! Prometheus metrics and the user-facing stats counters.
mod stats;

pub use stats::*;


use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref POLL_CYCLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("poll_cycles_total", "Poll cycles by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref POLL_CYCLE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("poll_cycle_duration_ms", "Duration of one poll cycle in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).unwrap_or_default())
    )
    .expect("metric can not be created");

    pub static ref ROWS_PROCESSED_TOTAL: IntCounter =
        IntCounter::new("rows_processed_total", "Data rows evaluated against the rule set")
            .expect("metric can not be created");

    pub static ref TRIGGERS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("triggers_total", "Fired rules by trigger reason"),
        &["reason"]
    )
    .expect("Should succeed to create metric");

    pub static ref COMPLETIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("completions_total", "Generation jobs by outcome"),
        &["outcome"]
    )
    .expect("Should succeed to create metric");

    pub static ref WRITES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("writes_total", "Write-backs by outcome, retries excluded"),
        &["outcome"]
    )
    .expect("Should succeed to create metric");

    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("errors_total", "Counted errors by pipeline stage"),
        &["stage"]
    )
    .expect("Should succeed to create metric");

    pub static ref GENERATIONS_IN_FLIGHT: IntGauge =
        IntGauge::new("generations_in_flight", "Generation workers currently running")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

/// Registers every engine metric into `registry`. Already-registered
/// collectors are skipped.
pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(POLL_CYCLES_TOTAL.clone()),
        Box::new(POLL_CYCLE_DURATION.clone()),
        Box::new(ROWS_PROCESSED_TOTAL.clone()),
        Box::new(TRIGGERS_TOTAL.clone()),
        Box::new(COMPLETIONS_TOTAL.clone()),
        Box::new(WRITES_TOTAL.clone()),
        Box::new(ERRORS_TOTAL.clone()),
        Box::new(GENERATIONS_IN_FLIGHT.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {:?}", e);
        }
    }
}

/// Serves `/metrics` until `shutdown_signal` changes
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics")
        .map(|| REGISTRY.clone())
        .and_then(metrics_handler);

    let bound = warp::serve(metrics_route).try_bind_with_graceful_shutdown(
        ([0, 0, 0, 0], port),
        async move {
            let _ = shutdown_signal.changed().await;
        },
    );
    match bound {
        Ok((addr, server)) => {
            info!("metrics server listening on {}", addr);
            server.await;
        }
        Err(e) => error!("metrics server could not bind port {}: {}", port, e),
    }
}

async fn metrics_handler(registry: Registry) -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    let res = match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };
    Ok(res)
}
