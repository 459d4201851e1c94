//! Operator authentication.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::server::auth::{client_ip, verify_ops_key, wait_seconds, AttemptError};
use crate::server::error::ApiError;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    authorized: bool,
}

/// Verify `x-ops-key` for the calling client, under the rate limiter.
pub fn check_ops_key(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Result<(), ApiError> {
    let ip = client_ip(headers, peer);

    state
        .limiter
        .attempt(&ip, Instant::now(), || verify_ops_key(&state.config, headers))
        .map_err(|e| match e {
            AttemptError::Locked(remaining) => {
                tracing::info!(%ip, "ops auth refused while locked out");
                ApiError::RateLimited {
                    wait_seconds: wait_seconds(remaining),
                }
            }
            AttemptError::Rejected(err) => {
                tracing::info!(%ip, error = %err, "ops auth failed");
                err
            }
        })
}

/// `POST /ops/auth`
pub async fn ops_auth(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Json<AuthResponse>, ApiError> {
    check_ops_key(&state, &headers, peer.map(|ConnectInfo(addr)| addr))?;
    Ok(Json(AuthResponse { authorized: true }))
}
