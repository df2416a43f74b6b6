//! Consumer-visible ordered record view.
//!
//! [`OrderedView`] is the live, indexable sequence the presentation layer
//! reads. It is always consistent with the canonical order after any
//! completed insertion. The pipeline's consumer task is the only writer;
//! readers share it through [`SharedView`].

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::order;
use crate::record::Record;

/// Ordered view shared between the consumer task and any readers.
///
/// Lock discipline: the consumer takes short write locks per insertion or
/// for the single swap of a buffer handoff; the producer takes a read lock
/// only to snapshot during a handback; presentation readers take read locks.
pub type SharedView = Arc<RwLock<OrderedView>>;

/// Create an empty shared view.
#[must_use]
pub fn shared() -> SharedView {
    Arc::new(RwLock::new(OrderedView::new()))
}

// =============================================================================
// OrderedView
// =============================================================================

/// An indexable sequence of records kept sorted by the canonical order.
#[derive(Debug, Default)]
pub struct OrderedView {
    records: Vec<Record>,
}

impl OrderedView {
    /// Create an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Build a view from already-sorted records.
    #[must_use]
    pub fn from_sorted(records: Vec<Record>) -> Self {
        debug_assert!(
            records
                .windows(2)
                .all(|w| order::canonical_cmp(&w[0], &w[1]) != std::cmp::Ordering::Greater),
            "from_sorted requires canonical order"
        );
        Self { records }
    }

    /// Insert a record at its canonical position, returning the index.
    pub fn insert_sorted(&mut self, record: Record) -> usize {
        order::insert_sorted(&mut self.records, record)
    }

    /// Replace the whole contents with an already-sorted list.
    ///
    /// This is the atomic-swap operation of a buffer handoff: one assignment,
    /// never incremental work, so a very large handoff cannot stall readers.
    pub fn replace(&mut self, records: Vec<Record>) {
        self.records = records;
    }

    /// Drop all records (view cleared or pipeline reset).
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Record at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Mutable record access, used by indent-level corrections.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.records.get_mut(index)
    }

    /// Number of records currently loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the view holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, oldest first.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Owned copy of the current contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.clone()
    }

    /// Iterate records oldest to newest.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Summary statistics.
    #[must_use]
    pub fn stats(&self) -> ViewStats {
        let sessions = {
            let mut ids: Vec<_> = self.records.iter().map(|r| r.session).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        ViewStats {
            len: self.records.len(),
            sessions,
        }
    }
}

impl<'a> IntoIterator for &'a OrderedView {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// =============================================================================
// ViewStats (serializable)
// =============================================================================

/// Serializable summary of an ordered view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewStats {
    /// Number of records loaded.
    pub len: usize,
    /// Number of distinct sessions represented.
    pub sessions: usize,
}

// =============================================================================
// Tests
// =============================================================================
