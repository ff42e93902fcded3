use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::error::AppError;
use crate::market::MarketSource;
use crate::pipeline::narrative::Narrative;
use crate::pipeline::{MarketRow, MarketStats, render_artifacts};
use crate::telemetry::metrics::{TRACKER_CYCLE_DURATION, TRACKER_CYCLES, TRACKER_SNAPSHOT_RECORDS};

/// The outcome of the most recent successful cycle. The byte buffers are the
/// exact content written to disk by that cycle.
#[derive(Debug)]
pub struct Published {
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub published_at: Instant,
    pub rows: Vec<MarketRow>,
    pub stats: MarketStats,
    pub narrative: Narrative,
    pub spreadsheet: Bytes,
    pub report: Bytes,
}

/// Shared handle used by both the scheduled job and the HTTP handlers.
///
/// Every cycle runs under `gate`, so cycles never overlap no matter whether
/// they come from the timer or from an on-demand refresh.
pub struct Tracker {
    source: Arc<dyn MarketSource>,
    store: ArtifactStore,
    stale_after: Duration,
    latest: RwLock<Option<Arc<Published>>>,
    gate: Mutex<()>,
}

impl Tracker {
    pub fn new(source: Arc<dyn MarketSource>, store: ArtifactStore, stale_after: Duration) -> Self {
        Self {
            source,
            store,
            stale_after,
            latest: RwLock::new(None),
            gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn latest(&self) -> Option<Arc<Published>> {
        self.latest.read().await.clone()
    }

    /// Nothing published yet counts as stale.
    pub async fn is_stale(&self) -> bool {
        match self.latest.read().await.as_ref() {
            Some(published) => published.published_at.elapsed() >= self.stale_after,
            None => true,
        }
    }

    /// Runs one fetch, render, write and publish cycle.
    pub async fn run_cycle(&self) -> Result<Arc<Published>, AppError> {
        let _gate = self.gate.lock().await;
        self.cycle_locked().await
    }

    /// Runs a cycle only if the published artifacts are stale once the gate is
    /// held. Returns whether a cycle ran.
    pub async fn refresh_if_stale(&self) -> Result<bool, AppError> {
        let _gate = self.gate.lock().await;
        if !self.is_stale().await {
            tracing::debug!("Artifacts refreshed while waiting, skipping cycle");
            return Ok(false);
        }
        self.cycle_locked().await?;
        Ok(true)
    }

    /// Starts a background refresh unless a cycle is already in flight.
    /// Never waits for the cycle itself.
    pub fn spawn_refresh_if_stale(self: &Arc<Self>) -> bool {
        if self.gate.try_lock().is_err() {
            return false;
        }

        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = tracker.refresh_if_stale().await {
                tracing::error!(error = %e, "On-demand refresh failed");
            }
        });
        true
    }

    #[tracing::instrument(
        name = "tracker cycle",
        skip(self),
        fields(
            cycle.id = tracing::field::Empty,
            source = self.source.name(),
            snapshot.records,
            cycle.duration_ms,
        )
    )]
    async fn cycle_locked(&self) -> Result<Arc<Published>, AppError> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::Span::current();
        span.record("cycle.id", cycle_id.to_string());

        let start = Instant::now();
        let result = self.fetch_render_write(cycle_id).await;
        let duration = start.elapsed();

        span.record("cycle.duration_ms", duration.as_millis() as u64);

        let outcome = if result.is_ok() { "success" } else { "failure" };
        TRACKER_CYCLES.add(1, &[KeyValue::new("outcome", outcome)]);
        TRACKER_CYCLE_DURATION.record(
            duration.as_secs_f64(),
            &[KeyValue::new("outcome", outcome)],
        );

        match result {
            Ok(published) => {
                span.record("snapshot.records", published.rows.len());
                TRACKER_SNAPSHOT_RECORDS.record(published.rows.len() as f64, &[]);

                tracing::info!(
                    cycle_id = %published.cycle_id,
                    coins = published.rows.len(),
                    total_market_cap = published.stats.overview.total_market_cap,
                    spreadsheet = %self.store.spreadsheet_path().display(),
                    report = %self.store.report_path().display(),
                    "Artifacts updated"
                );

                *self.latest.write().await = Some(Arc::clone(&published));
                Ok(published)
            }
            Err(e) => {
                tracing::error!(error = %e, "Cycle failed, keeping previous artifacts");
                Err(e)
            }
        }
    }

    async fn fetch_render_write(&self, cycle_id: Uuid) -> Result<Arc<Published>, AppError> {
        let snapshot = self.source.fetch_snapshot().await?;
        let generated_at = snapshot.taken_at;

        let artifacts = tokio::task::spawn_blocking(move || render_artifacts(&snapshot))
            .await
            .map_err(|e| AppError::Internal(format!("render task failed: {e}")))??;

        self.store.write(&artifacts).await?;

        Ok(Arc::new(Published {
            cycle_id,
            generated_at,
            published_at: Instant::now(),
            rows: artifacts.rows,
            stats: artifacts.stats,
            narrative: artifacts.narrative,
            spreadsheet: Bytes::from(artifacts.spreadsheet),
            report: Bytes::from(artifacts.report),
        }))
    }
}
