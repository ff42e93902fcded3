use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::tracker::{Published, Tracker};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Returns the last published cycle, kicking off a background refresh first
/// if it has gone stale. Never waits for that refresh.
pub(crate) async fn current(tracker: &Arc<Tracker>) -> AppResult<Arc<Published>> {
    if tracker.is_stale().await && tracker.spawn_refresh_if_stale() {
        tracing::info!("Artifacts are stale, refreshing in background");
    }
    tracker.latest().await.ok_or(AppError::NotReady)
}

fn attachment(body: Bytes, content_type: &str, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response()
}

/// GET / - the spreadsheet artifact
pub async fn spreadsheet(State(state): State<AppState>) -> AppResult<Response> {
    let published = current(&state.tracker).await?;
    Ok(attachment(
        published.spreadsheet.clone(),
        XLSX_CONTENT_TYPE,
        &state.tracker.store().spreadsheet_file_name(),
    ))
}

/// GET /market_report.docx - the narrative artifact
pub async fn report(State(state): State<AppState>) -> AppResult<Response> {
    let published = current(&state.tracker).await?;
    Ok(attachment(
        published.report.clone(),
        DOCX_CONTENT_TYPE,
        &state.tracker.store().report_file_name(),
    ))
}
