//! Timeout Integration Tests
//!
//! Tests for per-source timeout configuration and enforcement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skywatch::core::{EventRepository, InMemoryEventStore};
use skywatch::domain::Category;
use skywatch::ingest::{EventWatcher, FetchError, Fetcher, RawPayload, SourceDescriptor, SourceKind};

const FEED: &str = r#"<rss version="2.0"><channel><title>Launches</title>
<item><title>Falcon 9 flies</title><link>https://example.com/f9</link>
<pubDate>Sun, 11 Jan 2026 04:00:00 GMT</pubDate></item>
</channel></rss>"#;

/// Answers quickly for every source except those whose id starts with `slow`
struct SlowFetcher {
    delay: Duration,
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, source: &SourceDescriptor, _now: DateTime<Utc>) -> Result<RawPayload, FetchError> {
        if source.id.starts_with("slow") {
            tokio::time::sleep(self.delay).await;
        }
        if source.id.starts_with("broken") {
            return Err(FetchError::Transport("connection reset".to_string()));
        }
        Ok(RawPayload::new(&source.url, FEED))
    }
}

fn rss(id: &str) -> SourceDescriptor {
    SourceDescriptor::new(id, id, format!("https://example.com/{}.xml", id), SourceKind::Rss, Category::Launch)
}

#[test]
fn test_default_timeouts_by_kind() {
    assert_eq!(rss("feed").timeout(), Duration::from_secs(10));

    let page = SourceDescriptor::new("p", "P", "https://example.com", SourceKind::Page, Category::Artemis);
    assert_eq!(page.timeout(), Duration::from_secs(10));

    let eph = SourceDescriptor::new("e", "E", "https://example.com", SourceKind::Ephemeris, Category::SkyEvent);
    assert_eq!(eph.timeout(), Duration::from_secs(5));
}

#[test]
fn test_timeout_override_from_yaml() {
    let yaml = r#"
id: slow-feed
name: Slow Feed
url: https://example.com/slow.xml
kind: rss
category: launch
timeout_seconds: 3
"#;
    let source: SourceDescriptor = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(source.timeout(), Duration::from_secs(3));

    // Sub-second overrides round up to one second
    let source = rss("fast").with_timeout(Duration::from_millis(200));
    assert_eq!(source.timeout(), Duration::from_secs(1));
}

#[tokio::test]
async fn test_slow_source_times_out_without_failing_cycle() {
    let fetcher = Arc::new(SlowFetcher {
        delay: Duration::from_secs(30),
    });
    let store = Arc::new(InMemoryEventStore::default());

    let sources = vec![
        rss("slow-feed").with_timeout(Duration::from_secs(1)),
        rss("good-feed"),
        rss("broken-feed"),
    ];
    let watcher = EventWatcher::new(sources, fetcher, store.clone());

    let started = Instant::now();
    let report = watcher.run_cycle().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(10), "cycle took {:?}", elapsed);
    assert_eq!(report.stats.rss_items_found, 1);
    assert_eq!(report.stats.new_events_added, 1);
    assert_eq!(store.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_disabled_sources_are_not_fetched() {
    let fetcher = Arc::new(SlowFetcher {
        delay: Duration::from_secs(30),
    });
    let store = Arc::new(InMemoryEventStore::default());

    let mut slow = rss("slow-feed");
    slow.enabled = false;
    let watcher = EventWatcher::new(vec![slow], fetcher, store);

    let started = Instant::now();
    let report = watcher.run_cycle().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.stats.rss_items_found, 0);
}
