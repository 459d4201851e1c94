//! Ingestion cycle: fetch every source, normalize, store.
//!
//! Sources are fetched concurrently. A source that fails (timeout, HTTP
//! error, unparseable payload) contributes zero events and never fails the
//! cycle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::instrument;

use super::fetcher::{FetchError, Fetcher};
use super::normalizer::normalize;
use super::page::PageHashStore;
use super::source::{CycleContext, SourceDescriptor, SourceKind, DEFAULT_MAX_ITEMS, DEFAULT_SUMMARY_CHARS};
use crate::core::event_store::EventRepository;
use crate::domain::Event;

/// Counters reported for one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    pub rss_items_found: usize,
    pub page_changes_detected: usize,
    pub new_events_added: usize,
    pub total_events_stored: usize,
    pub artemis_events_found: usize,
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub stats: CycleStats,

    /// Events that were new to the store
    pub new_events: Vec<Event>,

    /// Subset of `new_events` in the Artemis category
    pub artemis_alerts: Vec<Event>,
}

/// Polls configured sources into an event store
pub struct EventWatcher {
    sources: Vec<SourceDescriptor>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn EventRepository>,
    pages: PageHashStore,
    max_items: usize,
    summary_chars: usize,
}

impl EventWatcher {
    pub fn new(
        sources: Vec<SourceDescriptor>,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            sources,
            fetcher,
            store,
            pages: PageHashStore::new(),
            max_items: DEFAULT_MAX_ITEMS,
            summary_chars: DEFAULT_SUMMARY_CHARS,
        }
    }

    pub fn with_limits(mut self, max_items: usize, summary_chars: usize) -> Self {
        self.max_items = max_items;
        self.summary_chars = summary_chars;
        self
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn store(&self) -> &Arc<dyn EventRepository> {
        &self.store
    }

    /// Run one cycle at the current time
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(Utc::now()).await
    }

    #[instrument(skip(self), fields(sources = self.sources.len()))]
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let ctx = CycleContext::new(now).with_limits(self.max_items, self.summary_chars);

        let enabled: Vec<&SourceDescriptor> = self.sources.iter().filter(|s| s.enabled).collect();
        let batches = join_all(enabled.iter().map(|s| self.collect_source(s, &ctx))).await;

        let mut stats = CycleStats::default();
        let mut collected = Vec::new();
        for (source, events) in enabled.iter().zip(batches) {
            match source.kind {
                SourceKind::Rss => stats.rss_items_found += events.len(),
                SourceKind::Page => stats.page_changes_detected += events.len(),
                SourceKind::Ephemeris | SourceKind::MoonPhases => {}
            }
            collected.extend(events);
        }

        let new_events = self.store.insert(collected).await?;
        let artemis_alerts: Vec<Event> = new_events.iter().filter(|e| e.is_artemis()).cloned().collect();

        stats.new_events_added = new_events.len();
        stats.total_events_stored = self.store.len().await?;
        stats.artemis_events_found = artemis_alerts.len();

        tracing::info!(
            rss = stats.rss_items_found,
            page_changes = stats.page_changes_detected,
            added = stats.new_events_added,
            stored = stats.total_events_stored,
            artemis = stats.artemis_events_found,
            "Watch cycle complete"
        );

        Ok(CycleReport {
            stats,
            new_events,
            artemis_alerts,
        })
    }

    /// Fetch and normalize one source, swallowing any failure
    async fn collect_source(&self, source: &SourceDescriptor, ctx: &CycleContext) -> Vec<Event> {
        let timeout = source.timeout();
        let fetched = tokio::time::timeout(timeout, self.fetcher.fetch(source, ctx.now))
            .await
            .unwrap_or(Err(FetchError::Timeout(timeout)));

        let payload = match fetched {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(source = %source.id, error = %e, "Source unavailable");
                return Vec::new();
            }
        };

        match normalize(&payload, source, ctx, &self.pages) {
            Ok(events) => {
                tracing::debug!(source = %source.id, count = events.len(), "Normalized");
                events
            }
            Err(e) => {
                tracing::warn!(source = %source.id, error = %e, "Could not normalize payload");
                Vec::new()
            }
        }
    }

    /// Run cycles on a fixed interval until the handle is stopped
    pub fn spawn_schedule(self: Arc<Self>, interval: Duration) -> WatchHandle {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("Stopping scheduled watch");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_cycle().await {
                            tracing::error!("Scheduled watch cycle failed: {:#}", e);
                        }
                    }
                }
            }
        });

        WatchHandle { stop_tx, task }
    }
}

/// Handle to a scheduled watcher task
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the schedule, waiting for an in-flight cycle to finish
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_store::InMemoryEventStore;
    use crate::domain::Category;
    use crate::ingest::fetcher::RawPayload;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticFetcher {
        bodies: HashMap<String, String>,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, source: &SourceDescriptor, _now: DateTime<Utc>) -> Result<RawPayload, FetchError> {
            self.bodies
                .get(&source.id)
                .map(|b| RawPayload::new(&source.url, b.clone()))
                .ok_or(FetchError::Status(404))
        }
    }

    const FEED: &str = r#"<rss version="2.0"><channel><title>F</title>
<item><title>Artemis II rollout</title><link>https://example.com/1</link>
<pubDate>Tue, 13 Jan 2026 10:00:00 GMT</pubDate></item>
<item><title>Cargo launch</title><link>https://example.com/2</link>
<pubDate>Wed, 14 Jan 2026 10:00:00 GMT</pubDate></item>
</channel></rss>"#;

    fn sources() -> Vec<SourceDescriptor> {
        vec![
            SourceDescriptor::new("feed", "Feed", "https://example.com/feed", SourceKind::Rss, Category::Official),
            SourceDescriptor::new("page", "Page", "https://example.com/page", SourceKind::Page, Category::Official),
            SourceDescriptor::new("down", "Down", "https://example.com/down", SourceKind::Rss, Category::Official),
        ]
    }

    #[tokio::test]
    async fn test_cycle_counts_and_isolation() {
        let mut bodies = HashMap::new();
        bodies.insert("feed".to_string(), FEED.to_string());
        bodies.insert("page".to_string(), "<p>v1</p>".to_string());

        let store = Arc::new(InMemoryEventStore::default());
        let watcher = EventWatcher::new(
            sources(),
            Arc::new(StaticFetcher { bodies }),
            store.clone(),
        );

        let report = watcher.run_cycle().await.unwrap();
        assert_eq!(report.stats.rss_items_found, 2);
        assert_eq!(report.stats.page_changes_detected, 0);
        assert_eq!(report.stats.new_events_added, 2);
        assert_eq!(report.stats.total_events_stored, 2);
        assert_eq!(report.stats.artemis_events_found, 1);
        assert_eq!(report.artemis_alerts[0].title, "Artemis II rollout");

        let again = watcher.run_cycle().await.unwrap();
        assert_eq!(again.stats.rss_items_found, 2);
        assert_eq!(again.stats.new_events_added, 0);
        assert_eq!(again.stats.total_events_stored, 2);
    }

    #[tokio::test]
    async fn test_schedule_stops() {
        let store = Arc::new(InMemoryEventStore::default());
        let watcher = Arc::new(EventWatcher::new(
            Vec::new(),
            Arc::new(StaticFetcher { bodies: HashMap::new() }),
            store,
        ));

        let handle = watcher.spawn_schedule(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.stop().await.unwrap();
    }
}
