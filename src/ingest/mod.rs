//! Source ingestion pipeline.
//!
//! ```text
//! SourceDescriptor → Fetcher → Normalizer → EventRepository
//!                                  ↓
//!                           PageHashStore (page sources)
//! ```
//!
//! - `source`: what to poll, timeouts, item limits
//! - `fetcher`: raw retrieval (the watcher bounds each fetch by its timeout)
//! - `normalizer`: RSS/Atom, ephemeris and moon phase parsing
//! - `page`: watched page change detection
//! - `watcher`: concurrent cycle runner and schedule

pub mod fetcher;
pub mod normalizer;
pub mod page;
pub mod source;
pub mod watcher;

pub use fetcher::{FetchError, Fetcher, HttpFetcher, RawPayload};
pub use normalizer::{normalize, NormalizeError};
pub use page::PageHashStore;
pub use source::{default_sources, CycleContext, SourceDescriptor, SourceKind};
pub use watcher::{CycleReport, CycleStats, EventWatcher, WatchHandle};
