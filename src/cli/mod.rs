//! Command-line interface for skywatch.
//!
//! Provides commands for serving the HTTP API, running a watch cycle,
//! browsing stored events and producing drafts for one event.
//!
//! Commands other than `serve` work against the file store at
//! `$SKYWATCH_HOME/events.json`, so consecutive invocations see the same
//! events.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::adapters::OpenAiGenerator;
use crate::config::{self, ResolvedConfig};
use crate::core::{
    DraftGenerator, DraftOutcome, DraftPipeline, DraftQueue, EventQuery, EventRepository,
    FileEventStore, ProcessedRegistry,
};
use crate::domain::{sample_event, sample_events, Category, Event, EventType};
use crate::ingest::{EventWatcher, HttpFetcher};

/// skywatch - Space-agency event watcher and draft pipeline
#[derive(Parser, Debug)]
#[command(name = "skywatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API (and the scheduled watch, if enabled)
    Serve {
        /// Address to bind to (defaults to the configured bind address)
        #[arg(short, long)]
        address: Option<String>,
    },

    /// Run one watch cycle over all enabled sources
    Watch,

    /// List stored events, newest first
    Events {
        /// Maximum number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only show this category
        #[arg(short, long, value_enum)]
        category: Option<CategoryArg>,

        /// Only show this event type
        #[arg(short = 't', long = "type", value_enum)]
        event_type: Option<TypeArg>,
    },

    /// Generate drafts for one event
    Draft {
        /// Event ID (stored or sample)
        event_id: String,
    },

    /// List configured sources
    Sources,

    /// Show current configuration
    Config,
}

/// Category filter for the CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Official,
    Artemis,
    Launch,
    SkyEvent,
    Other,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Official => Category::Official,
            CategoryArg::Artemis => Category::Artemis,
            CategoryArg::Launch => Category::Launch,
            CategoryArg::SkyEvent => Category::SkyEvent,
            CategoryArg::Other => Category::Other,
        }
    }
}

/// Event type filter for the CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TypeArg {
    Rss,
    PageChange,
    Ephemeris,
}

impl From<TypeArg> for EventType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Rss => EventType::Rss,
            TypeArg::PageChange => EventType::PageChange,
            TypeArg::Ephemeris => EventType::Ephemeris,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;

        match self.command {
            Commands::Serve { address } => {
                let bind_addr = address.unwrap_or_else(|| cfg.bind_addr.clone());
                crate::server::serve(cfg, &bind_addr).await
            }

            Commands::Watch => run_watch(cfg).await,

            Commands::Events {
                limit,
                category,
                event_type,
            } => {
                let query = EventQuery {
                    category: category.map(Into::into),
                    event_type: event_type.map(Into::into),
                    limit: Some(limit),
                };
                list_events(cfg, &query).await
            }

            Commands::Draft { event_id } => draft_event(cfg, &event_id).await,

            Commands::Sources => {
                list_sources(cfg);
                Ok(())
            }

            Commands::Config => {
                show_config(cfg);
                Ok(())
            }
        }
    }
}

async fn open_store(cfg: &ResolvedConfig) -> Result<FileEventStore> {
    FileEventStore::open(cfg.events_path(), cfg.limits.store_capacity)
        .await
        .with_context(|| format!("Failed to open event store at {}", cfg.events_path().display()))
}

/// Run one cycle and print what it found
async fn run_watch(cfg: &ResolvedConfig) -> Result<()> {
    let store: Arc<dyn EventRepository> = Arc::new(open_store(cfg).await?);
    let fetcher = Arc::new(HttpFetcher::new().context("Failed to build HTTP client")?);

    let watcher = EventWatcher::new(cfg.sources.clone(), fetcher, store)
        .with_limits(cfg.limits.items_per_feed, cfg.limits.summary_chars);

    eprintln!("Watching {} source(s)...", watcher.sources().iter().filter(|s| s.enabled).count());
    let report = watcher.run_cycle().await?;
    let stats = &report.stats;

    println!("Feed items found:      {}", stats.rss_items_found);
    println!("Page changes detected: {}", stats.page_changes_detected);
    println!("New events added:      {}", stats.new_events_added);
    println!("Total events stored:   {}", stats.total_events_stored);
    println!("Artemis events:        {}", stats.artemis_events_found);

    if !report.new_events.is_empty() {
        println!();
        print_events(&report.new_events);
    }

    Ok(())
}

/// List stored events, falling back to the sample set when the store is empty
async fn list_events(cfg: &ResolvedConfig, query: &EventQuery) -> Result<()> {
    let store = open_store(cfg).await?;

    let events = if store.is_empty().await? {
        eprintln!("No stored events; showing cached samples.");
        query.apply(&sample_events())
    } else {
        store.query(query).await?
    };

    if events.is_empty() {
        println!("No events match.");
        return Ok(());
    }

    print_events(&events);
    println!();
    println!("Total: {} event(s)", events.len());

    Ok(())
}

fn print_events(events: &[Event]) {
    println!("{:<18} {:<12} {:<12} {:<17} {}", "ID", "CATEGORY", "TYPE", "PUBLISHED", "TITLE");
    println!("{}", "-".repeat(100));

    for event in events {
        let title = if event.title.chars().count() > 40 {
            format!("{}...", event.title.chars().take(37).collect::<String>())
        } else {
            event.title.clone()
        };
        println!(
            "{:<18} {:<12} {:<12} {:<17} {}",
            event.id,
            event.category.as_str(),
            event.event_type.as_str(),
            event.published_at.format("%Y-%m-%d %H:%M"),
            title
        );
    }
}

/// Generate, check and print drafts for one event
async fn draft_event(cfg: &ResolvedConfig, event_id: &str) -> Result<()> {
    let store = open_store(cfg).await?;

    let event = match store.get(event_id).await? {
        Some(event) => event,
        None => sample_event(event_id)
            .with_context(|| format!("No stored or sample event with id {}", event_id))?,
    };

    let generator = if cfg.generation.api_key.is_some() {
        DraftGenerator::with_generator(Arc::new(OpenAiGenerator::new(cfg.generation.clone())))
    } else {
        eprintln!("No generation API key configured; using templates.");
        DraftGenerator::fallback_only()
    };
    let pipeline = DraftPipeline::new(
        generator,
        ProcessedRegistry::new(cfg.limits.registry_capacity),
        DraftQueue::default(),
    );

    eprintln!("Drafting for: {}", event.title);

    match pipeline.process(&event, false).await {
        DraftOutcome::Created { drafts, event_hash } => {
            println!("Event hash: {}", event_hash);
            for draft in &drafts {
                println!();
                println!(
                    "── {} ({} chars{}) ──",
                    draft.variant.as_str(),
                    draft.content.chars().count(),
                    if draft.repaired { ", repaired" } else { "" }
                );
                println!("{}", draft.content);
                for issue in &draft.issues {
                    println!("  ! {}", issue);
                }
            }
        }
        DraftOutcome::Duplicate { event_hash } => {
            println!("Already drafted (event hash {})", event_hash);
        }
    }

    Ok(())
}

fn list_sources(cfg: &ResolvedConfig) {
    println!("{:<20} {:<12} {:<10} {:<8} {}", "ID", "KIND", "CATEGORY", "ENABLED", "URL");
    println!("{}", "-".repeat(100));

    for source in &cfg.sources {
        println!(
            "{:<20} {:<12} {:<10} {:<8} {}",
            source.id,
            source.kind.as_str(),
            source.category.as_str(),
            if source.enabled { "yes" } else { "no" },
            source.url
        );
    }

    println!();
    println!("Total: {} source(s)", cfg.sources.len());
}

fn mask(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "(set)"
    } else {
        "(not set)"
    }
}

fn show_config(cfg: &ResolvedConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("  Skywatch Configuration");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:         {}", cfg.home.display());
    println!("  Event store:  {}", cfg.events_path().display());
    println!();
    println!("Server:");
    println!("  Bind address: {}", cfg.bind_addr);
    println!("  Production:   {}", cfg.production);
    if cfg.watch_interval.is_zero() {
        println!("  Watch every:  (disabled)");
    } else {
        println!("  Watch every:  {}s", cfg.watch_interval.as_secs());
    }
    println!("  Ops secret:   {}", mask(&cfg.ops_secret));
    println!("  Cron secret:  {}", mask(&cfg.cron_secret));
    println!();
    println!("Generation:");
    println!("  Base URL:     {}", cfg.generation.base_url);
    println!("  Model:        {}", cfg.generation.model);
    println!("  Timeout:      {}s", cfg.generation.timeout.as_secs());
    println!("  API key:      {}", mask(&cfg.generation.api_key));
    println!();
    println!("Limits:");
    println!("  Store capacity:    {}", cfg.limits.store_capacity);
    println!("  Registry capacity: {}", cfg.limits.registry_capacity);
    println!("  Items per feed:    {}", cfg.limits.items_per_feed);
    println!("  Summary chars:     {}", cfg.limits.summary_chars);
}
