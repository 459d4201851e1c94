//! Application state and configuration.

use std::sync::Arc;

use anyhow::Result;

use super::auth::RateLimiter;
use crate::adapters::OpenAiGenerator;
use crate::config::ResolvedConfig;
use crate::core::{DraftGenerator, DraftPipeline, DraftQueue, EventRepository, InMemoryEventStore, ProcessedRegistry};
use crate::ingest::{EventWatcher, HttpFetcher};

/// Settings the HTTP layer needs at request time.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Refuse unauthenticated manual watch triggers
    pub production: bool,

    /// Secret for `x-ops-key` (ops endpoints answer 503 without it)
    pub ops_secret: Option<String>,

    /// Bearer secret for the scheduled watch trigger
    pub cron_secret: Option<String>,
}

impl From<&ResolvedConfig> for ServerConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            production: config.production,
            ops_secret: config.ops_secret.clone(),
            cron_secret: config.cron_secret.clone(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub watcher: Arc<EventWatcher>,
    pub drafts: Arc<DraftPipeline>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: ServerConfig, watcher: EventWatcher, drafts: DraftPipeline) -> Self {
        Self {
            config: Arc::new(config),
            watcher: Arc::new(watcher),
            drafts: Arc::new(drafts),
            limiter: Arc::new(RateLimiter::default()),
        }
    }

    /// Wire the production components from resolved configuration.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let store: Arc<dyn EventRepository> =
            Arc::new(InMemoryEventStore::new(config.limits.store_capacity));

        let watcher = EventWatcher::new(config.sources.clone(), Arc::new(HttpFetcher::new()?), store)
            .with_limits(config.limits.items_per_feed, config.limits.summary_chars);

        let generator = DraftGenerator::with_generator(Arc::new(OpenAiGenerator::new(
            config.generation.clone(),
        )));
        let drafts = DraftPipeline::new(
            generator,
            ProcessedRegistry::new(config.limits.registry_capacity),
            DraftQueue::default(),
        );

        tracing::info!(
            sources = config.sources.len(),
            store_capacity = config.limits.store_capacity,
            generation = config.generation.api_key.is_some(),
            production = config.production,
            "application state ready"
        );

        Ok(Self::new(ServerConfig::from(config), watcher, drafts))
    }

    pub fn store(&self) -> &Arc<dyn EventRepository> {
        self.watcher.store()
    }
}
