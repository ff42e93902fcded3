use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let latest = state.tracker.latest().await;

    Json(json!({
        "status": "ok",
        "service": "crypto-market-tracker",
        "version": env!("CARGO_PKG_VERSION"),
        "ready": latest.is_some(),
        "last_updated": latest.map(|p| p.generated_at.to_rfc3339()),
    }))
}
