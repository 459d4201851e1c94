//! Watch trigger endpoint.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::ingest::CycleReport;
use crate::server::auth::authorize_watch;
use crate::server::error::ApiError;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct WatchResponse {
    success: bool,
    #[serde(flatten)]
    report: CycleReport,
}

/// `POST /watch/events`: run one ingestion cycle to completion.
pub async fn trigger_watch(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WatchResponse>, ApiError> {
    authorize_watch(&state.config, &headers)?;

    let report = state.watcher.run_cycle().await?;

    Ok(Json(WatchResponse {
        success: true,
        report,
    }))
}
