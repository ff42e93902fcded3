use crate::error::AppError;
use crate::market::Snapshot;

use super::analyze::{MarketStats, analyze};
use super::chart::change_histogram;
use super::narrative::{self, Narrative};
use super::process::{MarketRow, process};
use super::spreadsheet;

/// Everything one cycle derives from a snapshot, fully rendered in memory
/// before any file is touched.
#[derive(Debug, Clone)]
pub struct RenderedArtifacts {
    pub rows: Vec<MarketRow>,
    pub stats: MarketStats,
    pub narrative: Narrative,
    pub spreadsheet: Vec<u8>,
    pub report: Vec<u8>,
}

#[tracing::instrument(
    name = "pipeline render",
    skip(snapshot),
    fields(
        snapshot.records = snapshot.records.len(),
        spreadsheet.bytes,
        report.bytes,
    )
)]
pub fn render_artifacts(snapshot: &Snapshot) -> Result<RenderedArtifacts, AppError> {
    if snapshot.is_empty() {
        return Err(AppError::EmptySnapshot);
    }

    // Stage 1: tabulate
    let rows = process(snapshot);

    // Stage 2: statistics
    let stats = analyze(&rows, snapshot.taken_at)?;

    // Stage 3: encode both documents
    let spreadsheet = spreadsheet::render(&rows, &stats)?;
    let narrative = narrative::compose(&rows, &stats);
    let chart = change_histogram(&stats.change_distribution)?;
    let report = narrative::render(&narrative, &chart)?;

    let span = tracing::Span::current();
    span.record("spreadsheet.bytes", spreadsheet.len());
    span.record("report.bytes", report.len());

    Ok(RenderedArtifacts {
        rows,
        stats,
        narrative,
        spreadsheet,
        report,
    })
}
