pub mod artifacts;
pub mod dashboard;
pub mod health;
pub mod snapshot;

use axum::{Router, routing::get};

use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(artifacts::spreadsheet))
        .route("/market_report.docx", get(artifacts::report))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/api/snapshot", get(snapshot::snapshot))
        .route("/api/health", get(health::health))
        .with_state(state)
}
