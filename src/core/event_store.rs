//! Bounded, ordered event store.
//!
//! Holds the most recent canonical events, newest first. Inserting dedupes
//! against stored ids, re-sorts by `published_at` and evicts the oldest
//! events beyond capacity.
//!
//! Storage sits behind [`EventRepository`] so the in-memory store used by
//! tests and the server can be swapped for the file-backed one the CLI uses.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use crate::domain::{Category, Event, EventType};

/// Default number of retained events
pub const DEFAULT_STORE_CAPACITY: usize = 200;

/// Default and maximum page sizes for queries
pub const DEFAULT_QUERY_LIMIT: usize = 20;
pub const MAX_QUERY_LIMIT: usize = 100;

/// Filter for reading events back
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub category: Option<Category>,

    #[serde(rename = "type")]
    pub event_type: Option<EventType>,

    pub limit: Option<usize>,
}

impl EventQuery {
    /// Requested limit clamped to 1..=100
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT)
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.category.map_or(true, |c| event.category == c)
            && self.event_type.map_or(true, |t| event.event_type == t)
    }

    /// Filter then truncate
    pub fn apply<'a, I>(&self, events: I) -> Vec<Event>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        events
            .into_iter()
            .filter(|e| self.matches(e))
            .take(self.effective_limit())
            .cloned()
            .collect()
    }
}

/// Storage interface for canonical events
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert events, returning the ones that were new and retained
    async fn insert(&self, events: Vec<Event>) -> Result<Vec<Event>>;

    /// Newest-first events matching the query
    async fn query(&self, query: &EventQuery) -> Result<Vec<Event>>;

    async fn get(&self, id: &str) -> Result<Option<Event>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Merge `incoming` into `existing` (newest first), returning what was added.
///
/// Skips ids already present (or repeated within the batch) and RSS items
/// whose `(source, url)` is already stored. New events are prepended, the
/// whole list re-sorted by `published_at` descending, then cut to capacity.
pub fn merge_events(existing: &mut Vec<Event>, incoming: Vec<Event>, capacity: usize) -> Vec<Event> {
    let mut ids: HashSet<String> = existing.iter().map(|e| e.id.clone()).collect();
    let mut links: HashSet<(String, String)> = existing
        .iter()
        .filter_map(rss_link_key)
        .collect();

    let mut fresh = Vec::new();
    for event in incoming {
        if ids.contains(&event.id) {
            continue;
        }
        if let Some(key) = rss_link_key(&event) {
            if links.contains(&key) {
                continue;
            }
            links.insert(key);
        }
        ids.insert(event.id.clone());
        fresh.push(event);
    }

    if fresh.is_empty() {
        return Vec::new();
    }

    let fresh_ids: HashSet<String> = fresh.iter().map(|e| e.id.clone()).collect();
    let mut merged = fresh;
    merged.append(existing);
    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged.truncate(capacity);
    *existing = merged;

    existing
        .iter()
        .filter(|e| fresh_ids.contains(&e.id))
        .cloned()
        .collect()
}

fn rss_link_key(event: &Event) -> Option<(String, String)> {
    if event.event_type == EventType::Rss && !event.url.is_empty() {
        Some((event.source.clone(), event.url.clone()))
    } else {
        None
    }
}

/// In-memory store, the default for the server
pub struct InMemoryEventStore {
    capacity: usize,
    events: RwLock<Vec<Event>>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_CAPACITY)
    }
}

impl InMemoryEventStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: RwLock::new(Vec::new()),
        }
    }

    /// Start from a previously saved list
    pub fn with_events(capacity: usize, events: Vec<Event>) -> Self {
        let capacity = capacity.max(1);
        let mut list = Vec::new();
        merge_events(&mut list, events, capacity);
        Self {
            capacity,
            events: RwLock::new(list),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of every stored event, newest first
    pub async fn snapshot(&self) -> Vec<Event> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventStore {
    async fn insert(&self, events: Vec<Event>) -> Result<Vec<Event>> {
        let mut stored = self.events.write().await;
        Ok(merge_events(&mut stored, events, self.capacity))
    }

    async fn query(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let stored = self.events.read().await;
        Ok(query.apply(stored.iter()))
    }

    async fn get(&self, id: &str) -> Result<Option<Event>> {
        let stored = self.events.read().await;
        Ok(stored.iter().find(|e| e.id == id).cloned())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.events.read().await.len())
    }
}

/// In-memory store mirrored to a JSON snapshot on disk
pub struct FileEventStore {
    path: PathBuf,
    memory: InMemoryEventStore,
    write_lock: Mutex<()>,
}

impl FileEventStore {
    /// Open (or create) a store backed by `path`
    pub async fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }

        let events = if path.exists() {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read event store: {}", path.display()))?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse event store: {}", path.display()))?
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            memory: InMemoryEventStore::with_events(capacity, events),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self) -> Result<()> {
        let events = self.memory.snapshot().await;
        let json = serde_json::to_string_pretty(&events).context("Failed to serialize events")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write event store: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace event store: {}", self.path.display()))?;

        Ok(())
    }
}

#[async_trait]
impl EventRepository for FileEventStore {
    async fn insert(&self, events: Vec<Event>) -> Result<Vec<Event>> {
        let _guard = self.write_lock.lock().await;
        let added = self.memory.insert(events).await?;
        if !added.is_empty() {
            self.save().await?;
        }
        Ok(added)
    }

    async fn query(&self, query: &EventQuery) -> Result<Vec<Event>> {
        self.memory.query(query).await
    }

    async fn get(&self, id: &str) -> Result<Option<Event>> {
        self.memory.get(id).await
    }

    async fn len(&self) -> Result<usize> {
        self.memory.len().await
    }
}
