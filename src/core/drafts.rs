//! Draft generation pipeline.
//!
//! For one event:
//! 1. Check the processed registry (skip events already drafted)
//! 2. Generate three variants, from the text service or from templates
//! 3. Validate each against the safety policy, repairing when it fails
//! 4. Queue the drafts for human review
//!
//! Generation problems never reach the caller: any failure falls back to the
//! deterministic templates below.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::registry::{draft_key, ProcessedRegistry};
use super::safety::{attribution_label, repair, repair_draft, validate_draft};
use crate::adapters::{GeneratedDraft, GenerationFailure, TextGenerator};
use crate::domain::{Category, Draft, DraftError, Event, Variant};
use crate::ingest::normalizer::truncate_summary;

/// Default number of drafts kept for review
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

// ─── Fallback templates ──────────────────────────────────────────────────────

/// Hashtags derived from the event
pub fn hashtags(event: &Event) -> Vec<&'static str> {
    let mut tags = vec!["#Space"];
    let text = event.source_text().to_lowercase();

    if event.category == Category::Artemis || text.contains("artemis") {
        tags.push("#Artemis");
    }
    if event.source.to_lowercase().contains("nasa") {
        tags.push("#NASA");
    }
    if event.category == Category::Launch {
        tags.push("#Launch");
    }
    if event.category == Category::SkyEvent {
        tags.push("#NightSky");
    }

    tags
}

/// Deterministic post text for one variant, already policy-clean
pub fn fallback_content(event: &Event, variant: Variant) -> String {
    repair(&template(event, variant), variant, event)
}

fn template(event: &Event, variant: Variant) -> String {
    let label = attribution_label(event);
    let tags = hashtags(event).join(" ");
    let url_line = if event.url.is_empty() {
        String::new()
    } else {
        format!("\n{}", event.url)
    };

    match variant {
        Variant::Short => format!("{} via {} {}", truncate_summary(&event.title, 60), label, tags),
        Variant::Medium => {
            let mut text = truncate_summary(&event.title, 90);
            if !event.summary.is_empty() {
                text.push_str("\n\n");
                text.push_str(&truncate_summary(&event.summary, 100));
            }
            format!("{}\n\nSource: {}{}", text, label, url_line)
        }
        Variant::ShipVoice => {
            let mut text = format!("Ship's log: {}.", truncate_summary(&event.title, 80));
            if !event.summary.is_empty() {
                text.push(' ');
                text.push_str(&truncate_summary(&event.summary, 140));
            }
            format!("{}\n\nSource: {}{}\n{}", text, label, url_line, tags)
        }
    }
}

// ─── Generation ──────────────────────────────────────────────────────────────

/// Produces exactly one draft per variant
#[derive(Clone, Default)]
pub struct DraftGenerator {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl DraftGenerator {
    /// Templates only
    pub fn fallback_only() -> Self {
        Self { generator: None }
    }

    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    pub async fn generate(&self, event: &Event) -> Vec<Draft> {
        let generated = match &self.generator {
            Some(generator) => match generator.generate(event).await {
                Ok(drafts) => drafts,
                Err(GenerationFailure::MissingCredentials) => {
                    info!("No generation credentials, using templates");
                    Vec::new()
                }
                Err(e) => {
                    warn!(generator = generator.name(), error = %e, "Generation failed, using templates");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        Variant::ALL
            .iter()
            .map(|&variant| {
                let content = pick(&generated, variant)
                    .unwrap_or_else(|| fallback_content(event, variant));
                Draft::new(&event.id, variant, content)
            })
            .collect()
    }
}

fn pick(generated: &[GeneratedDraft], variant: Variant) -> Option<String> {
    generated
        .iter()
        .find(|d| d.variant == variant)
        .map(|d| d.content.clone())
}

// ─── Review queue ────────────────────────────────────────────────────────────

/// Bounded list of drafts awaiting or past review, oldest first
pub struct DraftQueue {
    capacity: usize,
    drafts: Mutex<VecDeque<Draft>>,
}

impl Default for DraftQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl DraftQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            drafts: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_all(&self, drafts: &[Draft]) {
        let mut queue = self.drafts.lock();
        queue.extend(drafts.iter().cloned());
        while queue.len() > self.capacity {
            queue.pop_front();
        }
    }

    pub fn list(&self) -> Vec<Draft> {
        self.drafts.lock().iter().cloned().collect()
    }

    /// Human approval of a queued draft
    pub fn approve(&self, id: Uuid) -> Result<Draft, DraftError> {
        let mut queue = self.drafts.lock();
        let draft = queue
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(DraftError::NotFound(id))?;
        draft.approve()?;
        Ok(draft.clone())
    }

    pub fn len(&self) -> usize {
        self.drafts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Result of asking for drafts for one event
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DraftOutcome {
    Created { drafts: Vec<Draft>, event_hash: String },
    Duplicate { event_hash: String },
}

impl DraftOutcome {
    pub fn event_hash(&self) -> &str {
        match self {
            Self::Created { event_hash, .. } | Self::Duplicate { event_hash } => event_hash,
        }
    }
}

/// Registry check, generation, safety pass and queueing
pub struct DraftPipeline {
    generator: DraftGenerator,
    registry: ProcessedRegistry,
    queue: DraftQueue,
}

impl DraftPipeline {
    pub fn new(generator: DraftGenerator, registry: ProcessedRegistry, queue: DraftQueue) -> Self {
        Self {
            generator,
            registry,
            queue,
        }
    }

    pub fn queue(&self) -> &DraftQueue {
        &self.queue
    }

    /// Draft an event unless it was drafted before (or `force` is set)
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn process(&self, event: &Event, force: bool) -> DraftOutcome {
        let event_hash = draft_key(event);

        // Claim before generating so concurrent requests cannot both proceed
        let claimed = self.registry.claim(&event_hash);
        if !claimed && !force {
            info!(%event_hash, "Event already drafted");
            return DraftOutcome::Duplicate { event_hash };
        }

        let drafts: Vec<Draft> = self
            .generator
            .generate(event)
            .await
            .into_iter()
            .filter_map(|draft| check_and_repair(draft, event))
            .collect();

        self.queue.push_all(&drafts);
        info!(%event_hash, count = drafts.len(), "Drafts queued");

        DraftOutcome::Created { drafts, event_hash }
    }
}

/// Validate a draft, repairing it when any rule fails.
///
/// Returns `None` when the repaired text still fails; such drafts never
/// reach the review queue.
pub fn check_and_repair(draft: Draft, event: &Event) -> Option<Draft> {
    let report = validate_draft(&draft, event);

    let draft = if report.valid {
        draft
    } else {
        debug!(variant = %draft.variant, issues = ?report.messages(), "Repairing draft");
        let repaired = repair_draft(draft, event).with_repairs(report.messages());

        let recheck = validate_draft(&repaired, event);
        if !recheck.valid {
            warn!(
                variant = %repaired.variant,
                issues = ?recheck.messages(),
                "Repaired draft still fails policy, dropping"
            );
            return None;
        }
        repaired
    };

    if !draft.within_length_target() {
        debug!(
            variant = %draft.variant,
            chars = draft.content.chars().count(),
            target = draft.variant.max_chars(),
            "Draft exceeds length target"
        );
    }

    Some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::safety::validate;
    use crate::domain::{sample_event, DraftStatus};
    use async_trait::async_trait;

    struct CannedGenerator(Result<Vec<GeneratedDraft>, u16>);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _event: &Event) -> Result<Vec<GeneratedDraft>, GenerationFailure> {
            self.0.clone().map_err(GenerationFailure::Status)
        }
    }

    fn pipeline(generator: DraftGenerator) -> DraftPipeline {
        DraftPipeline::new(generator, ProcessedRegistry::default(), DraftQueue::default())
    }

    #[test]
    fn test_fallbacks_pass_policy_for_samples() {
        for id in ["sample-1", "sample-2", "sample-3", "sample-4"] {
            let event = sample_event(id).unwrap();
            for variant in Variant::ALL {
                let content = fallback_content(&event, variant);
                let report = validate(&content, variant, &event);
                assert!(report.valid, "{} {}: {:?}\n{}", id, variant, report.issues, content);
            }
        }
    }

    #[test]
    fn test_hashtags() {
        let artemis = sample_event("sample-1").unwrap();
        assert_eq!(hashtags(&artemis), vec!["#Space", "#Artemis", "#NASA"]);

        let moon = sample_event("sample-4").unwrap();
        assert_eq!(hashtags(&moon), vec!["#Space", "#NightSky"]);
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back() {
        let event = sample_event("sample-2").unwrap();
        let generator = DraftGenerator::with_generator(Arc::new(CannedGenerator(Err(500))));

        let drafts = generator.generate(&event).await;
        assert_eq!(drafts.len(), 3);
        for draft in &drafts {
            assert_eq!(draft.content, fallback_content(&event, draft.variant));
        }
    }

    #[tokio::test]
    async fn test_missing_variant_uses_template() {
        let event = sample_event("sample-2").unwrap();
        let generated = vec![GeneratedDraft {
            variant: Variant::Short,
            content: "Lunar instruments picked via NASA #Space".to_string(),
        }];
        let generator = DraftGenerator::with_generator(Arc::new(CannedGenerator(Ok(generated))));

        let drafts = generator.generate(&event).await;
        assert_eq!(drafts[0].content, "Lunar instruments picked via NASA #Space");
        assert_eq!(drafts[1].content, fallback_content(&event, Variant::Medium));
        assert_eq!(drafts[2].content, fallback_content(&event, Variant::ShipVoice));
    }

    #[tokio::test]
    async fn test_pipeline_repairs_and_dedupes() {
        let event = sample_event("sample-3").unwrap();
        let generated = vec![GeneratedDraft {
            variant: Variant::Medium,
            content: "Crew launch confirmed for next week".to_string(),
        }];
        let pipeline = pipeline(DraftGenerator::with_generator(Arc::new(CannedGenerator(Ok(
            generated,
        )))));

        let outcome = pipeline.process(&event, false).await;
        let DraftOutcome::Created { drafts, event_hash } = outcome else {
            panic!("expected drafts");
        };
        assert_eq!(event_hash, draft_key(&event));
        assert_eq!(drafts.len(), 3);
        assert!(drafts.iter().all(|d| d.status == DraftStatus::Draft));
        assert!(drafts.iter().all(|d| validate_draft(d, &event).valid));

        let medium = &drafts[1];
        assert!(medium.repaired);
        assert!(medium.content.starts_with("Crew launch (NET) reported for next week"));
        assert_eq!(pipeline.queue().len(), 3);

        assert!(matches!(
            pipeline.process(&event, false).await,
            DraftOutcome::Duplicate { .. }
        ));
        assert!(matches!(
            pipeline.process(&event, true).await,
            DraftOutcome::Created { .. }
        ));
        assert_eq!(pipeline.queue().len(), 6);
    }

    #[test]
    fn test_unrepairable_draft_is_dropped() {
        // The notice the repairer appends is itself the source name, so it
        // cannot count as provisional language
        let event = Event::new(
            "Timing subject to change.",
            Category::Launch,
            crate::domain::EventType::Rss,
            "Launch window opens",
            "",
            chrono::Utc::now(),
        );

        let draft = Draft::new(&event.id, Variant::Medium, "Rocket rolls out");
        assert!(check_and_repair(draft, &event).is_none());

        let clean = Draft::new(&event.id, Variant::Medium, "Launch window opens. Source: Timing");
        let kept = check_and_repair(clean, &event).unwrap();
        assert!(!kept.repaired);
    }

    #[tokio::test]
    async fn test_queue_approve() {
        let pipeline = pipeline(DraftGenerator::fallback_only());
        let event = sample_event("sample-4").unwrap();
        let DraftOutcome::Created { drafts, .. } = pipeline.process(&event, false).await else {
            panic!("expected drafts");
        };

        let approved = pipeline.queue().approve(drafts[0].id).unwrap();
        assert_eq!(approved.status, DraftStatus::Approved);
        assert!(matches!(
            pipeline.queue().approve(drafts[0].id),
            Err(DraftError::InvalidTransition { .. })
        ));
        assert!(matches!(
            pipeline.queue().approve(Uuid::new_v4()),
            Err(DraftError::NotFound(_))
        ));
    }
}
