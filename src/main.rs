use std::path::Path;

use crosstab::spawn_task;
use crosstab::CrosstabConfig;
use crosstab::EngineBuilder;
use crosstab::Error;
use crosstab::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    let config = CrosstabConfig::new()?.validate()?;
    config.source.validate_credentials()?;
    config.completion.validate_credentials()?;

    // Initializing Logs
    let _guard = init_observability(&config.monitoring.log_dir)?;
    info!(?config, "configuration loaded");

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    // Build Engine
    let mut engine = match EngineBuilder::new(config)
        .start_metrics_server(graceful_rx.clone())
        .build()
        .await
    {
        Ok(engine) => engine,
        Err(e) => {
            error!("engine failed to start: {}", e);
            let _ = graceful_tx.send(());
            return Err(e);
        }
    };

    info!("Application started. Waiting for CTRL+C signal...");
    // Listen on Shutdown Signal
    spawn_task("graceful_shutdown", move || graceful_shutdown(graceful_tx), None).await;

    // Start polling
    if let Err(e) = engine.run(graceful_rx).await {
        error!("poll loop stopped: {:?}", e);
    }

    if let Err(e) = engine.shutdown().await {
        error!("unclean shutdown: {}", e);
    }
    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

/// File logging through a non-blocking writer plus stdout, both filtered by
/// `RUST_LOG`
fn init_observability(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| Error::Fatal(format!("cannot create log dir {}: {}", log_dir.display(), e)))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "crosstab.log");

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(EnvFilter::from_default_env());
    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(file_layer).with(stdout_layer).init();

    Ok(guard)
}
