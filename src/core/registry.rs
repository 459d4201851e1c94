//! Processed-event registry for draft generation.
//!
//! Remembers which upstream events already had drafts generated so the same
//! story is not drafted twice. Holds only hashes, bounded, with FIFO eviction
//! by insertion order. An evicted key may be drafted again, nothing is lost.
//!
//! Separate from event ids: keys are derived from `(source, title prefix)`.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::domain::{content_hash, Event};

/// Default number of remembered events
pub const DEFAULT_REGISTRY_CAPACITY: usize = 1000;

/// Characters of the title that participate in the key
pub const TITLE_PREFIX_CHARS: usize = 50;

/// Key for an event in the registry (16 hex chars)
pub fn draft_key(event: &Event) -> String {
    let prefix: String = event.title.chars().take(TITLE_PREFIX_CHARS).collect();
    content_hash(&format!("{}\u{1f}{}", event.source, prefix))
}

/// Bounded, insertion-ordered set of processed keys
pub struct ProcessedRegistry {
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl Default for ProcessedRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_CAPACITY)
    }
}

impl ProcessedRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().members.contains(key)
    }

    /// Record a key. Returns false when it was already present.
    ///
    /// Check and insert happen under one lock, so two concurrent claims of the
    /// same key cannot both succeed.
    pub fn claim(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.members.contains(key) {
            return false;
        }

        inner.members.insert(key.to_string());
        inner.order.push_back(key.to_string());

        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.members.remove(&oldest);
            }
        }

        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
