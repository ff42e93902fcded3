use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::tracker::Tracker;

/// Runs a cycle on every tick until `shutdown` fires. The first tick is
/// immediate. A cycle in progress when shutdown arrives is allowed to finish.
pub async fn run_schedule(
    tracker: Arc<Tracker>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval_secs = every.as_secs(), "Scheduler started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tracing::info!("Updating data");
                if let Err(e) = tracker.run_cycle().await {
                    tracing::error!(error = %e, "Scheduled cycle failed, waiting for next tick");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Scheduler received shutdown signal");
                break;
            }
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
