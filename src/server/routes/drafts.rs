//! Draft generation and review endpoints.

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ops::check_ops_key;
use crate::core::DraftOutcome;
use crate::domain::{sample_event, Draft};
use crate::server::error::ApiError;
use crate::server::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    event_id: String,
    #[serde(default)]
    force_duplicate: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    drafts_created: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    drafts: Vec<Draft>,
    event_hash: String,
}

#[derive(Debug, Serialize)]
pub struct DraftListResponse {
    success: bool,
    drafts: Vec<Draft>,
    total: usize,
}

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    success: bool,
    draft: Draft,
}

/// `GET /ai/comet-generate-post`
pub async fn list_drafts(State(state): State<AppState>) -> Json<DraftListResponse> {
    let drafts = state.drafts.queue().list();
    Json(DraftListResponse {
        success: true,
        total: drafts.len(),
        drafts,
    })
}

/// `POST /ai/comet-generate-post`
///
/// Looks the event up in the store, then in the sample list.
pub async fn generate_drafts(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let event = match state.store().get(&request.event_id).await? {
        Some(event) => event,
        None => sample_event(&request.event_id).ok_or_else(|| ApiError::NotFound {
            code: "EVENT_NOT_FOUND",
            message: format!("no event with id {}", request.event_id),
        })?,
    };

    let response = match state.drafts.process(&event, request.force_duplicate).await {
        DraftOutcome::Created { drafts, event_hash } => GenerateResponse {
            success: true,
            error: None,
            drafts_created: drafts.len(),
            drafts,
            event_hash,
        },
        DraftOutcome::Duplicate { event_hash } => GenerateResponse {
            success: false,
            error: Some("DUPLICATE_EVENT"),
            drafts_created: 0,
            drafts: Vec::new(),
            event_hash,
        },
    };

    Ok(Json(response))
}

/// `POST /ai/comet-generate-post/:draft_id/approve` (requires `x-ops-key`)
pub async fn approve_draft(
    State(state): State<AppState>,
    Path(draft_id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Json<DraftResponse>, ApiError> {
    check_ops_key(&state, &headers, peer.map(|ConnectInfo(addr)| addr))?;

    let id = Uuid::parse_str(&draft_id)
        .map_err(|_| ApiError::BadRequest(format!("invalid draft id: {}", draft_id)))?;

    let draft = state.drafts.queue().approve(id)?;
    tracing::info!(draft_id = %draft.id, variant = %draft.variant, "Draft approved");

    Ok(Json(DraftResponse {
        success: true,
        draft,
    }))
}
