use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{app::AppState, ingest::IngestStatus};

/// POST /api/v1/ingest/run - dispatch an ingestion pass without blocking the
/// request. A pass already in flight coalesces the trigger.
pub async fn trigger_ingest(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let ingestor = state.ingestor.clone();
    tokio::spawn(async move {
        ingestor.try_run().await;
    });
    (StatusCode::ACCEPTED, Json(json!({ "status": "scheduled" })))
}

/// GET /api/v1/ingest/status - whether a pass is running plus the last report
pub async fn ingest_status(State(state): State<AppState>) -> Json<IngestStatus> {
    Json(state.ingestor.status().await)
}
