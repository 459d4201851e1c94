//! HTTP API.
//!
//! Thin axum layer over the ingestion watcher and the draft pipeline. All
//! shared state lives in [`AppState`].

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::Request;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, ServerConfig};

use crate::config::ResolvedConfig;

/// Router with tracing and CORS layers applied
pub fn app(state: AppState) -> Router {
    router(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind and serve until Ctrl+C.
///
/// Starts the scheduled watch when the configured interval is non-zero.
pub async fn serve(config: &ResolvedConfig, bind_addr: &str) -> Result<()> {
    let state = AppState::from_config(config)?;

    let schedule = if config.watch_interval.is_zero() {
        None
    } else {
        tracing::info!(interval = ?config.watch_interval, "scheduled watch enabled");
        Some(Arc::clone(&state.watcher).spawn_schedule(config.watch_interval))
    };

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!(addr = %bind_addr, "starting server");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutting down");
    })
    .await
    .context("Server error")?;

    if let Some(handle) = schedule {
        handle.stop().await?;
    }

    Ok(())
}
