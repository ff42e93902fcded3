use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;
use crate::error::AppResult;

use super::artifacts::current;

pub async fn snapshot(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let published = current(&state.tracker).await?;

    Ok(Json(json!({
        "cycle_id": published.cycle_id,
        "generated_at": published.generated_at.to_rfc3339(),
        "rows": published.rows,
        "stats": published.stats,
    })))
}
