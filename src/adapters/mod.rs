//! Adapter interfaces for external systems.
//!
//! Currently one seam: the text generation service used for post drafts.

pub mod generation;

pub use generation::{
    parse_generated, GeneratedDraft, GenerationFailure, GeneratorConfig, OpenAiGenerator,
    TextGenerator,
};
