//! Core pipeline logic.
//!
//! This module contains:
//! - EventStore: bounded, ordered event repository
//! - Registry: processed-event set for draft dedup
//! - Safety: draft policy validation and repair
//! - Drafts: generation, review queue, and the draft pipeline

pub mod drafts;
pub mod event_store;
pub mod registry;
pub mod safety;

// Re-export commonly used types
pub use drafts::{DraftGenerator, DraftOutcome, DraftPipeline, DraftQueue};
pub use event_store::{EventQuery, EventRepository, FileEventStore, InMemoryEventStore};
pub use registry::{draft_key, ProcessedRegistry};
pub use safety::{repair, validate, PolicyViolation, ValidationReport};
