//! Factual-safety policy for generated drafts.
//!
//! Every draft is checked against four rules before a human sees it:
//! - Source attribution
//! - Source URL (except the short variant)
//! - Provisional timing language (NET / window) carried over from the source
//! - No confirmation claims the source did not make
//!
//! [`validate`] reports every failing rule. [`repair`] rewrites the text so
//! that all rules pass; it is deterministic and idempotent.
//!
//! URLs and whole-word mentions of the source name are protected spans: the
//! repairer never edits inside them and the word rules ignore matches that
//! lie entirely within one.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Draft, Event, Variant};

/// Text appended when no "launch" can carry the NET marker
pub const PROVISIONAL_NOTICE: &str = "Timing subject to change.";

/// A single rule a draft failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyViolation {
    #[error("Missing source attribution")]
    MissingSourceAttribution,

    #[error("Missing source URL")]
    MissingSourceUrl,

    #[error("Missing NET/window language")]
    MissingProvisionalLanguage,

    #[error("Claims confirmation not in source")]
    UnverifiedConfirmation,
}

/// Outcome of checking one draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<PolicyViolation>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<PolicyViolation>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }

    /// Human-readable issue strings
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }
}

/// Check draft content against the policy. Pure.
pub fn validate(content: &str, variant: Variant, event: &Event) -> ValidationReport {
    let policy = EventPolicy::new(event);
    let mut issues = Vec::new();

    if !policy.has_attribution(content) {
        issues.push(PolicyViolation::MissingSourceAttribution);
    }

    if policy.requires_url(variant) && !content.contains(event.url.as_str()) {
        issues.push(PolicyViolation::MissingSourceUrl);
    }

    if policy.provisional_required && !policy.has_provisional(content) {
        issues.push(PolicyViolation::MissingProvisionalLanguage);
    }

    if policy.has_unverified_claim(content) {
        issues.push(PolicyViolation::UnverifiedConfirmation);
    }

    ValidationReport::from_issues(issues)
}

/// Rewrite draft content so it satisfies the policy.
///
/// Each step is a no-op when its rule already holds, except claim softening
/// which always runs.
pub fn repair(content: &str, variant: Variant, event: &Event) -> String {
    let policy = EventPolicy::new(event);

    let mut text = policy.replace_words(content, confirmed_re(), "reported");
    text = policy.replace_words(&text, official_re(), "announced");

    if policy.provisional_required && !policy.has_provisional(&text) {
        text = policy.mark_launches(&text);
        if !policy.has_provisional(&text) {
            text.push_str("\n\n");
            text.push_str(PROVISIONAL_NOTICE);
        }
    }

    if !policy.has_attribution(&text) {
        text = match variant {
            Variant::Short => splice_before_hashtag(&text, &format!("via {}", policy.label)),
            _ => format!("{}\n\nSource: {}", text, policy.label),
        };
    }

    if policy.requires_url(variant) && !text.contains(event.url.as_str()) {
        text.push('\n');
        text.push_str(&event.url);
    }

    text
}

/// Validate a stored draft
pub fn validate_draft(draft: &Draft, event: &Event) -> ValidationReport {
    validate(&draft.content, draft.variant, event)
}

/// Repair a draft in place of its content
pub fn repair_draft(mut draft: Draft, event: &Event) -> Draft {
    draft.content = repair(&draft.content, draft.variant, event);
    draft
}

/// Name used when splicing attribution into a draft
pub fn attribution_label(event: &Event) -> String {
    let trimmed = event.source.trim();
    if trimmed.is_empty() {
        "unknown source".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Short lower-case tag that counts as attribution in draft text
pub fn source_tag(label: &str) -> String {
    let lower = label.to_lowercase();
    if lower.contains("nasa") {
        return "nasa".to_string();
    }
    lower
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Per-event facts every rule needs
struct EventPolicy<'a> {
    event: &'a Event,
    label: String,
    tag: String,
    provisional_required: bool,
    source_text: String,
    /// Source label and URL, matched as whole words
    literals: Vec<Regex>,
}

impl<'a> EventPolicy<'a> {
    fn new(event: &'a Event) -> Self {
        let label = attribution_label(event);
        let tag = source_tag(&label);
        let source_text = event.source_text();
        let provisional_required = provisional_re().is_match(&source_text);
        let literals = [event.url.as_str(), label.as_str()]
            .into_iter()
            .filter_map(literal_re)
            .collect();

        Self {
            event,
            label,
            tag,
            provisional_required,
            source_text,
            literals,
        }
    }

    fn requires_url(&self, variant: Variant) -> bool {
        variant != Variant::Short && !self.event.url.is_empty()
    }

    fn has_attribution(&self, content: &str) -> bool {
        let lower = content.to_lowercase();
        lower.contains("source:") || (!self.tag.is_empty() && lower.contains(&self.tag))
    }

    fn has_provisional(&self, content: &str) -> bool {
        !self.open_matches(content, provisional_re()).is_empty()
    }

    fn has_unverified_claim(&self, content: &str) -> bool {
        [confirmed_re(), official_re()].into_iter().any(|re| {
            !self.open_matches(content, re).is_empty() && !re.is_match(&self.source_text)
        })
    }

    /// Matches of `re` not contained in a protected span
    fn open_matches(&self, content: &str, re: &Regex) -> Vec<Range<usize>> {
        let spans = self.protected_spans(content);
        re.find_iter(content)
            .map(|m| m.range())
            .filter(|m| !spans.iter().any(|s| s.start <= m.start && m.end <= s.end))
            .collect()
    }

    fn protected_spans(&self, content: &str) -> Vec<Range<usize>> {
        std::iter::once(url_re())
            .chain(self.literals.iter())
            .flat_map(|re| re.find_iter(content).map(|m| m.range()))
            .collect()
    }

    /// Replace whole-word matches outside protected spans, keeping case shape
    fn replace_words(&self, content: &str, re: &Regex, replacement: &str) -> String {
        self.rewrite(content, re, |found| match_case(found, replacement))
    }

    fn mark_launches(&self, content: &str) -> String {
        self.rewrite(content, launch_re(), |found| format!("{} (NET)", found))
    }

    fn rewrite<F>(&self, content: &str, re: &Regex, f: F) -> String
    where
        F: Fn(&str) -> String,
    {
        let matches = self.open_matches(content, re);
        if matches.is_empty() {
            return content.to_string();
        }

        let mut out = String::with_capacity(content.len() + matches.len() * 8);
        let mut last = 0;
        for range in matches {
            out.push_str(&content[last..range.start]);
            out.push_str(&f(&content[range.clone()]));
            last = range.end;
        }
        out.push_str(&content[last..]);
        out
    }
}

/// Insert `phrase` before the first hashtag, or append it when there is none
fn splice_before_hashtag(content: &str, phrase: &str) -> String {
    match first_hashtag(content) {
        Some(idx) => {
            let head = content[..idx].trim_end();
            if head.is_empty() {
                format!("{} {}", phrase, &content[idx..])
            } else {
                format!("{} {} {}", head, phrase, &content[idx..])
            }
        }
        None => {
            let head = content.trim_end();
            if head.is_empty() {
                phrase.to_string()
            } else {
                format!("{} {}", head, phrase)
            }
        }
    }
}

/// Byte index of the first `#tag` token that starts a word
fn first_hashtag(content: &str) -> Option<usize> {
    let mut prev_is_space = true;
    let mut chars = content.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c == '#' && prev_is_space {
            if let Some((_, next)) = chars.peek() {
                if next.is_alphanumeric() {
                    return Some(idx);
                }
            }
        }
        prev_is_space = c.is_whitespace();
    }
    None
}

/// Case-insensitive matcher for `needle`, anchored at word boundaries where
/// the needle starts or ends with a word character
fn literal_re(needle: &str) -> Option<Regex> {
    let first = needle.chars().next()?;
    let last = needle.chars().last()?;
    let edge = |c: char| if c.is_alphanumeric() || c == '_' { r"\b" } else { "" };

    Regex::new(&format!("(?i){}{}{}", edge(first), regex::escape(needle), edge(last))).ok()
}

fn match_case(found: &str, replacement: &str) -> String {
    let has_letters = found.chars().any(|c| c.is_alphabetic());
    if has_letters && found.chars().all(|c| !c.is_lowercase()) {
        return replacement.to_uppercase();
    }
    if found.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
        let mut chars = replacement.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
    }
    replacement.to_string()
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("policy regex is valid"))
}

fn provisional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?i)\bnet\b|\bwindow\b|\bsubject to change\b")
}

fn confirmed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?i)\bconfirmed\b")
}

fn official_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?i)\bofficial\b")
}

fn launch_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"(?i)\blaunch\b")
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"https?://\S+")
}
