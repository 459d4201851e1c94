//! Domain types for skywatch.
//!
//! - Event: normalized record of something that happened upstream
//! - Draft: candidate social post derived from one event
//! - samples: fixed fallback events served while the store is empty

pub mod draft;
pub mod event;
pub mod samples;

pub use draft::{Draft, DraftError, DraftStatus, Variant, DEFAULT_PLATFORM};
pub use event::{content_hash, event_id, Category, Event, EventType};
pub use samples::{sample_event, sample_events};
