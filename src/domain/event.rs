//! Canonical event records produced by ingestion.
//!
//! Events are immutable once normalized. Their id is a content hash so that
//! re-ingesting the same upstream item always lands on the same record.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A normalized occurrence reported by an external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Content hash, see [`event_id`]
    pub id: String,

    /// Name of the feed/page/API the event came from
    pub source: String,

    /// Location of the source itself (feed URL, watched page URL)
    #[serde(default)]
    pub source_url: String,

    pub title: String,

    /// Link to the upstream item (may be empty for synthetic events)
    #[serde(default)]
    pub url: String,

    /// When upstream says this happened (ingestion time if unknown)
    pub published_at: DateTime<Utc>,

    pub category: Category,

    /// Plain text, markup stripped and truncated
    #[serde(default)]
    pub summary: String,

    #[serde(rename = "type")]
    pub event_type: EventType,

    /// When this record was created by the normalizer
    pub created_at: DateTime<Utc>,

    /// Optional illustration taken from feed media elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Event {
    /// Create a new event, deriving its id from the identifying fields
    pub fn new(
        source: impl Into<String>,
        category: Category,
        event_type: EventType,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let published_at = truncate_to_seconds(published_at);
        Self {
            id: event_id(category, event_type, &title, published_at),
            source: source.into(),
            source_url: String::new(),
            title,
            url: url.into(),
            published_at,
            category,
            summary: String::new(),
            event_type,
            created_at: Utc::now(),
            image_url: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = source_url.into();
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    /// Override the ingestion timestamp (used for fixed sample data)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Replace the content-derived id (sample data uses stable literal ids)
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Recompute the content hash from this event's own fields
    pub fn compute_id(&self) -> String {
        event_id(self.category, self.event_type, &self.title, self.published_at)
    }

    /// Title and summary joined, the text drafts are checked against
    pub fn source_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }

    pub fn is_artemis(&self) -> bool {
        self.category == Category::Artemis
    }
}

/// Editorial bucket an event is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Official,
    Artemis,
    Launch,
    SkyEvent,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Artemis => "artemis",
            Self::Launch => "launch",
            Self::SkyEvent => "sky_event",
            Self::Other => "other",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Other
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which producer created the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An item from an RSS or Atom feed
    Rss,

    /// A watched page whose visible text changed
    PageChange,

    /// Ephemeris / moon-phase data
    Ephemeris,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::PageChange => "page_change",
            Self::Ephemeris => "ephemeris",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable id for an event: first 16 hex chars of
/// SHA256(category | type | title | publishedAt).
pub fn event_id(
    category: Category,
    event_type: EventType,
    title: &str,
    published_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(event_type.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(
        published_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .as_bytes(),
    );
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Hash arbitrary content (first 16 hex chars of SHA256)
pub fn content_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}
