//! Social post drafts and their review lifecycle.
//!
//! A Draft is derived from one Event and waits in the queue until a human
//! approves it. Publishing happens elsewhere.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default target platform for generated posts
pub const DEFAULT_PLATFORM: &str = "x";

/// A candidate social post tied to one event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: Uuid,

    /// Id of the originating event (lookup only)
    pub event_id: String,

    pub platform: String,

    pub variant: Variant,

    pub content: String,

    pub status: DraftStatus,

    pub created_at: DateTime<Utc>,

    /// Whether the repairer had to touch the generated text
    #[serde(default)]
    pub repaired: bool,

    /// Validator findings that were repaired
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl Draft {
    /// Create a new draft in the DRAFT state
    pub fn new(event_id: impl Into<String>, variant: Variant, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id: event_id.into(),
            platform: DEFAULT_PLATFORM.to_string(),
            variant,
            content: content.into(),
            status: DraftStatus::Draft,
            created_at: Utc::now(),
            repaired: false,
            issues: Vec::new(),
        }
    }

    /// Record which issues were repaired on the way in
    pub fn with_repairs(mut self, issues: Vec<String>) -> Self {
        self.repaired = !issues.is_empty();
        self.issues = issues;
        self
    }

    /// Length target is advisory, never enforced
    pub fn within_length_target(&self) -> bool {
        self.content.chars().count() < self.variant.max_chars()
    }

    /// Move to a new status, rejecting transitions the review flow forbids
    pub fn transition(&mut self, to: DraftStatus) -> Result<(), DraftError> {
        if !self.status.can_transition_to(to) {
            return Err(DraftError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Human approval
    pub fn approve(&mut self) -> Result<(), DraftError> {
        self.transition(DraftStatus::Approved)
    }
}

/// Post flavours generated for every event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Short,
    Medium,
    ShipVoice,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Short, Variant::Medium, Variant::ShipVoice];

    /// Soft character budget
    pub fn max_chars(&self) -> usize {
        match self {
            Self::Short => 100,
            Self::Medium => 200,
            Self::ShipVoice => 280,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::ShipVoice => "ship_voice",
        }
    }

    /// Lenient parse of the names a generation service might use
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "short" => Some(Self::Short),
            "medium" => Some(Self::Medium),
            "ship_voice" | "shipvoice" => Some(Self::ShipVoice),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of a draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DraftStatus {
    /// Waiting for review
    Draft,

    /// Approved by a human
    Approved,

    /// Published by the external publisher
    Posted,

    /// Publishing failed
    Failed,
}

impl DraftStatus {
    pub fn can_transition_to(&self, to: DraftStatus) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Approved)
                | (Self::Approved, Self::Posted)
                | (Self::Approved, Self::Failed)
                | (Self::Failed, Self::Approved)
        )
    }
}

impl Default for DraftStatus {
    fn default() -> Self {
        Self::Draft
    }
}

/// Errors from the draft lifecycle
#[derive(Debug, Clone, Error)]
pub enum DraftError {
    #[error("Draft not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition: {from:?} → {to:?}")]
    InvalidTransition { from: DraftStatus, to: DraftStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_draft_defaults() {
        let draft = Draft::new("evt-1", Variant::Short, "Hello #Space");

        assert_eq!(draft.status, DraftStatus::Draft);
        assert_eq!(draft.platform, "x");
        assert!(!draft.repaired);
        assert!(draft.within_length_target());
    }

    #[test]
    fn test_review_flow() {
        let mut draft = Draft::new("evt-1", Variant::Medium, "text");

        // Cannot skip approval
        let err = draft.transition(DraftStatus::Posted).unwrap_err();
        assert!(matches!(
            err,
            DraftError::InvalidTransition {
                from: DraftStatus::Draft,
                to: DraftStatus::Posted
            }
        ));

        draft.approve().unwrap();
        assert_eq!(draft.status, DraftStatus::Approved);

        // Approving twice is rejected
        assert!(draft.approve().is_err());

        draft.transition(DraftStatus::Failed).unwrap();
        draft.approve().unwrap();
        draft.transition(DraftStatus::Posted).unwrap();
        assert_eq!(draft.status, DraftStatus::Posted);
    }

    #[test]
    fn test_length_target_is_advisory() {
        let draft = Draft::new("evt-1", Variant::Short, "x".repeat(150));
        assert!(!draft.within_length_target());
        assert_eq!(draft.content.len(), 150);
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!(Variant::parse("short"), Some(Variant::Short));
        assert_eq!(Variant::parse("Ship Voice"), Some(Variant::ShipVoice));
        assert_eq!(Variant::parse("ship-voice"), Some(Variant::ShipVoice));
        assert_eq!(Variant::parse("long"), None);
    }

    #[test]
    fn test_status_serialization() {
        let draft = Draft::new("evt-1", Variant::ShipVoice, "text");
        let json = serde_json::to_value(&draft).unwrap();

        assert_eq!(json["status"], "DRAFT");
        assert_eq!(json["variant"], "ship_voice");
        assert_eq!(json["eventId"], "evt-1");
    }
}
