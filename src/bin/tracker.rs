use std::sync::Arc;

use tokio::sync::broadcast;

use crypto_market_tracker::{
    Config, Tracker,
    artifacts::ArtifactStore,
    market::{BinanceSource, MarketSource},
    scheduler::{run_schedule, shutdown_signal},
    telemetry::init_telemetry,
};

/// Runs the refresh schedule without the HTTP server, keeping the artifacts
/// on disk current for another process to serve.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let telemetry_guard = init_telemetry(&config, "tracker")?;

    tracing::info!(
        environment = %config.environment,
        spreadsheet = %config.spreadsheet_path.display(),
        report = %config.report_path.display(),
        "Starting tracker"
    );

    let source: Arc<dyn MarketSource> = Arc::new(BinanceSource::new(&config)?);
    let tracker = Arc::new(Tracker::new(
        source,
        ArtifactStore::from_config(&config),
        config.stale_after,
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let schedule_handle = tokio::spawn(run_schedule(
        tracker,
        config.refresh_interval,
        shutdown_tx.subscribe(),
    ));

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    schedule_handle.await?;

    tracing::info!("Tracker shutdown complete");
    telemetry_guard.shutdown();

    Ok(())
}
