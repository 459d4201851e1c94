//! Raw retrieval of source content.
//!
//! A fetch either yields the body or a [`FetchError`]. Callers treat every
//! error the same way: the source contributes nothing this cycle.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::source::SourceDescriptor;

/// Body retrieved from one source
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// URL actually requested (placeholders resolved)
    pub url: String,

    pub body: String,

    pub content_type: Option<String>,

    pub fetched_at: DateTime<Utc>,
}

impl RawPayload {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            content_type: None,
            fetched_at: Utc::now(),
        }
    }
}

/// Why a source could not be read
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Retrieves raw content for a source.
///
/// Implementations need not enforce the source timeout; the watcher does.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor, now: DateTime<Utc>) -> Result<RawPayload, FetchError>;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("skywatch/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn request(&self, url: &str) -> Result<(String, Option<String>), FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok((body, content_type))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceDescriptor, now: DateTime<Utc>) -> Result<RawPayload, FetchError> {
        let url = source.resolved_url(now);

        tracing::debug!(source = %source.id, %url, "Fetching");

        let (body, content_type) = self.request(&url).await?;

        Ok(RawPayload {
            url,
            body,
            content_type,
            fetched_at: Utc::now(),
        })
    }
}
