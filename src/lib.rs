//! skywatch - Space-agency event watcher with a draft safety pipeline
//!
//! Polls agency feeds, watched pages and astronomy APIs, normalizes what it
//! finds into a bounded event store, and turns individual events into
//! candidate social posts that must pass a content-safety policy before a
//! human approves them.
//!
//! # Architecture
//!
//! - Ingestion never fails a whole cycle: each source is fetched and
//!   normalized in isolation, and errors are logged and skipped
//! - Events are identified by a content hash, so re-ingesting the same item
//!   is a no-op
//! - Drafts never reach the queue without passing validation (repairing them
//!   when needed), and each event is drafted at most once per process
//!
//! # Modules
//!
//! - `domain`: Data structures (Event, Draft, samples)
//! - `ingest`: Sources, fetching, normalization, page-change detection, watcher
//! - `core`: Event store, safety policy, processed registry, draft pipeline
//! - `adapters`: Text generation service client
//! - `server`: HTTP API
//! - `config`: Configuration file and environment resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run one watch cycle and list what is stored
//! skywatch watch
//! skywatch events --category artemis
//!
//! # Draft posts for a sample event
//! skywatch draft sample-1
//!
//! # Serve the HTTP API
//! skywatch serve --address 127.0.0.1:8080
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod server;

// Re-export main types at crate root for convenience
pub use core::{DraftPipeline, EventRepository, InMemoryEventStore};
pub use domain::{Category, Draft, DraftStatus, Event, EventType, Variant};
pub use ingest::{EventWatcher, SourceDescriptor};
