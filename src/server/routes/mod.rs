//! API route definitions.

mod drafts;
mod events;
mod health;
mod ops;
mod watch;

use axum::routing::{get, post};
use axum::Router;

use crate::server::state::AppState;

/// Build the complete API router.
///
/// - `GET /health` - Health check
/// - `GET /events/recent` - Newest stored events (sample data while empty)
/// - `POST /watch/events` - Run one ingestion cycle (cron secret / dev only)
/// - `GET /ai/comet-generate-post` - Draft review queue
/// - `POST /ai/comet-generate-post` - Generate drafts for an event
/// - `POST /ai/comet-generate-post/:draft_id/approve` - Approve a draft (ops key)
/// - `POST /ops/auth` - Verify an ops key
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/events/recent", get(events::recent_events))
        .route("/watch/events", post(watch::trigger_watch))
        .route(
            "/ai/comet-generate-post",
            get(drafts::list_drafts).post(drafts::generate_drafts),
        )
        .route(
            "/ai/comet-generate-post/:draft_id/approve",
            post(drafts::approve_draft),
        )
        .route("/ops/auth", post(ops::ops_auth))
        .with_state(state)
}
