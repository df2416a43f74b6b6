//! Repeated scope-marker suppression.
//!
//! When a log file rotates while a scope is open, the writer re-emits the
//! open scope markers into the new file so a follower that starts mid-stream
//! still sees them. A reader following the whole set therefore encounters
//! those markers twice, flagged `is_repeated` on the later copy. This filter
//! drops the copies and forwards everything else untouched.
//!
//! This is a pure filter: it never errors and never drops anything except
//! repeated markers whose key was already seen.

use std::collections::HashSet;

use crate::record::{Record, RecordKey};

/// Tracks seen scope-marker keys across a pipeline run.
#[derive(Debug, Default)]
pub struct ScopeDeduper {
    seen: HashSet<RecordKey>,
}

impl ScopeDeduper {
    /// Create an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `record` should be forwarded downstream.
    ///
    /// Returns `false` exactly when the record is a scope marker flagged
    /// repeated whose (session, counter) key has been seen before. Scope
    /// markers that pass are remembered so their later copies are dropped.
    pub fn accept(&mut self, record: &Record) -> bool {
        let Some(payload) = record.scope() else {
            return true;
        };
        let key = record.key();
        if payload.is_repeated && self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key);
        true
    }

    /// Number of distinct scope keys seen so far.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Forget all seen keys (pipeline reset).
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
