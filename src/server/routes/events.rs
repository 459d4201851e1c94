//! Recent events endpoint.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::EventQuery;
use crate::domain::{sample_events, Event};
use crate::server::error::ApiError;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct RecentEventsResponse {
    success: bool,
    events: Vec<Event>,
    meta: EventsMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsMeta {
    total: usize,
    artemis_count: usize,
    /// True when the store was empty and fixed sample data was served
    using_cache: bool,
    fetched_at: DateTime<Utc>,
}

/// `GET /events/recent?limit=&category=&type=`
///
/// Falls back to the sample list while the store is empty.
pub async fn recent_events(
    State(state): State<AppState>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> Result<Json<RecentEventsResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let store = state.store();

    let (events, using_cache) = if store.is_empty().await? {
        (query.apply(sample_events().iter()), true)
    } else {
        (store.query(&query).await?, false)
    };

    let meta = EventsMeta {
        total: events.len(),
        artemis_count: events.iter().filter(|e| e.is_artemis()).count(),
        using_cache,
        fetched_at: Utc::now(),
    };

    Ok(Json(RecentEventsResponse {
        success: true,
        events,
        meta,
    }))
}
