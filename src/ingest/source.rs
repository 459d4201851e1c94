//! Source descriptors: what to poll and how to interpret it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Category;

/// Default number of feed items taken per source
pub const DEFAULT_MAX_ITEMS: usize = 10;

/// Hard cap on items per feed regardless of configuration
pub const MAX_ITEMS_CAP: usize = 15;

/// Default summary budget in characters
pub const DEFAULT_SUMMARY_CHARS: usize = 280;

/// How a source's payload is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// RSS 2.0 or Atom feed
    Rss,
    /// HTML page watched for content changes
    Page,
    /// JPL Horizons ephemeris output
    Ephemeris,
    /// USNO moon phase API
    MoonPhases,
}

impl SourceKind {
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Rss | Self::Page => Duration::from_secs(10),
            Self::Ephemeris | Self::MoonPhases => Duration::from_secs(5),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Page => "page",
            Self::Ephemeris => "ephemeris",
            Self::MoonPhases => "moon_phases",
        }
    }
}

/// One configured upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Short stable identifier (used for page hashes and logs)
    pub id: String,

    /// Human-readable name, becomes `Event::source`
    pub name: String,

    /// URL to fetch; `{today}` is replaced with the cycle date
    pub url: String,

    pub kind: SourceKind,

    /// Category assigned to events from this source
    #[serde(default)]
    pub category: Category,

    /// Per-source timeout override
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Per-source item limit override
    #[serde(default)]
    pub max_items: Option<usize>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SourceDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        kind: SourceKind,
        category: Category,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            kind,
            category,
            timeout_seconds: None,
            max_items: None,
            enabled: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = Some(timeout.as_secs().max(1));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_seconds
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or_else(|| self.kind.default_timeout())
    }

    /// Item limit for this source, bounded by [`MAX_ITEMS_CAP`]
    pub fn item_limit(&self, default: usize) -> usize {
        self.max_items.unwrap_or(default).clamp(1, MAX_ITEMS_CAP)
    }

    /// URL with placeholders filled in for the given instant
    pub fn resolved_url(&self, now: DateTime<Utc>) -> String {
        self.url
            .replace("{today}", &now.format("%Y-%m-%d").to_string())
    }
}

/// Per-cycle parameters handed to normalizers
#[derive(Debug, Clone, Copy)]
pub struct CycleContext {
    pub now: DateTime<Utc>,
    pub max_items: usize,
    pub summary_chars: usize,
}

impl CycleContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            max_items: DEFAULT_MAX_ITEMS,
            summary_chars: DEFAULT_SUMMARY_CHARS,
        }
    }

    pub fn with_limits(mut self, max_items: usize, summary_chars: usize) -> Self {
        self.max_items = max_items;
        self.summary_chars = summary_chars;
        self
    }
}

/// Built-in source list used when configuration names none
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new(
            "nasa-news",
            "NASA News Releases",
            "https://www.nasa.gov/news-release/feed/",
            SourceKind::Rss,
            Category::Official,
        ),
        SourceDescriptor::new(
            "nasa-artemis-blog",
            "NASA Artemis Blog",
            "https://www.nasa.gov/blogs/missions/feed/",
            SourceKind::Rss,
            Category::Official,
        ),
        SourceDescriptor::new(
            "spaceflight-now",
            "Spaceflight Now",
            "https://spaceflightnow.com/feed/",
            SourceKind::Rss,
            Category::Launch,
        ),
        SourceDescriptor::new(
            "artemis-ii-page",
            "NASA Artemis II Mission Page",
            "https://www.nasa.gov/mission/artemis-ii/",
            SourceKind::Page,
            Category::Artemis,
        ),
        SourceDescriptor::new(
            "usno-moon-phases",
            "USNO Moon Phases",
            "https://aa.usno.navy.mil/api/moon/phases/date?date={today}&nump=4",
            SourceKind::MoonPhases,
            Category::SkyEvent,
        ),
        SourceDescriptor::new(
            "jpl-horizons-moon",
            "JPL Horizons",
            "https://ssd.jpl.nasa.gov/api/horizons.api?format=json&COMMAND='301'&EPHEM_TYPE='OBSERVER'&CENTER='500@399'&START_TIME='{today}'&STOP_TIME='{today} 23:59'&STEP_SIZE='6h'&QUANTITIES='1,9'&CSV_FORMAT='YES'",
            SourceKind::Ephemeris,
            Category::SkyEvent,
        ),
    ]
}
