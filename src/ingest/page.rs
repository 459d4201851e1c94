//! Change detection for watched HTML pages.
//!
//! A page is reduced to its visible text and hashed. The first observation
//! only records a baseline; later observations emit a `page_change` event when
//! the hash moves.

use std::collections::HashMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::normalizer::{classify, visible_text};
use super::source::{CycleContext, SourceDescriptor};
use crate::domain::{Event, EventType};

/// Last seen fingerprint per source id
#[derive(Default)]
pub struct PageHashStore {
    hashes: Mutex<HashMap<String, String>>,
}

impl PageHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hash` for `source_id`, returning the previous value
    pub fn observe(&self, source_id: &str, hash: String) -> Option<String> {
        self.hashes.lock().insert(source_id.to_string(), hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// SHA-256 (hex) of the page's visible text
pub fn page_fingerprint(html: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(visible_text(html).as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare against the stored fingerprint, emitting an event on change
pub fn detect_page_change(
    html: &str,
    source: &SourceDescriptor,
    ctx: &CycleContext,
    pages: &PageHashStore,
) -> Option<Event> {
    let hash = page_fingerprint(html);
    let previous = pages.observe(&source.id, hash.clone())?;

    if previous == hash {
        return None;
    }

    tracing::info!(source = %source.id, "Watched page changed");

    let title = format!("{} updated", source.name);
    let summary = format!(
        "Content on {} changed since the last check.",
        source.url
    );
    let category = classify(source.category, &title, &summary);

    Some(
        Event::new(&source.name, category, EventType::PageChange, title, &source.url, ctx.now)
            .with_source_url(&source.url)
            .with_summary(summary)
            .with_created_at(ctx.now),
    )
}
