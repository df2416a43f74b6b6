//! Canonical record ordering and sorted insertion.
//!
//! The merge pipeline keeps every collection sorted by one canonical total
//! order: timestamp first, then the sequence counter with wraparound
//! correction, then session and thread ids as deterministic tie-breaks.
//! Insertion locates its position by binary search so large backlogs stay
//! cheap to extend.
//!
//! # Counter wraparound
//!
//! Sequence counters wrap at the signed 32-bit boundary. Two counters within
//! [`WRAP_MARGIN`] of opposite ends of the range are treated as logically
//! continuous across the wrap, so a record numbered near `i32::MAX` still
//! sorts before one numbered near `i32::MIN` when their timestamps tie.

use std::cmp::Ordering;

use crate::record::Record;

/// Counters within this distance of the `i32` boundary are considered to
/// continue past it.
pub const WRAP_MARGIN: i32 = 10_000;

/// Compare two sequence counters with wraparound correction.
#[must_use]
pub fn cmp_counter(a: i32, b: i32) -> Ordering {
    if a > i32::MAX - WRAP_MARGIN && b < i32::MIN + WRAP_MARGIN {
        // a is just before the wrap, b just after: a comes first.
        Ordering::Less
    } else if b > i32::MAX - WRAP_MARGIN && a < i32::MIN + WRAP_MARGIN {
        Ordering::Greater
    } else {
        a.cmp(&b)
    }
}

/// Canonical strict total order over records.
///
/// Two records compare equal only if they agree on time, counter, session
/// and thread, which for well-formed input means they are the same record.
#[must_use]
pub fn canonical_cmp(a: &Record, b: &Record) -> Ordering {
    a.time
        .cmp(&b.time)
        .then_with(|| cmp_counter(a.counter, b.counter))
        .then_with(|| a.session.cmp(&b.session))
        .then_with(|| a.thread_id.cmp(&b.thread_id))
}

/// Insert `record` into `records` keeping canonical order, returning the
/// insertion index.
///
/// Uses binary search; an equal-comparing record is placed after the
/// existing one so arrival order is preserved among true duplicates.
pub fn insert_sorted(records: &mut Vec<Record>, record: Record) -> usize {
    let index = records.partition_point(|existing| canonical_cmp(existing, &record) != Ordering::Greater);
    records.insert(index, record);
    index
}

// =============================================================================
// Tests
// =============================================================================
