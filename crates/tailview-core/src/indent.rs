//! Indent and session-context resolution.
//!
//! Stamps each record's derived fields: the nesting depth of its logical
//! thread at emission time (`indent_level`), the session's UTC offset in
//! minutes (`utc_offset`), and the key of the session's most recent
//! `LogStart` record (`log_start`).
//!
//! Two operating modes produce identical results for the same input:
//!
//! - [`resolve_batch`] makes one pass over a fully buffered, sorted list.
//!   Used for historical catch-up before a buffer handoff.
//! - [`resolve_inserted`] resolves a single record just placed into the
//!   live ordered view by looking backward for the nearest preceding record
//!   on the same thread/session, then corrects affected successors: indent
//!   forward until the next scope marker on the thread, and session context
//!   forward until the next record that establishes its own.
//!
//! Scope markers label the *outer* level on both sides so enter/exit
//! brackets align: an enter marker carries the depth before its increment,
//! an exit marker the depth after its decrement. Context (offset, log-start
//! reference) propagates forward only; records before a session's `LogStart`
//! never acquire it retroactively.

use std::collections::HashMap;

use crate::record::{Record, RecordKey, ScopeKind, SessionId};
use crate::view::OrderedView;

/// Indent label of a scope marker: enter brackets show the level outside
/// the scope, exit and log-start markers show their own level.
fn scope_indent(kind: ScopeKind, level: i32) -> i32 {
    match kind {
        ScopeKind::Enter => level - 1,
        ScopeKind::Exit | ScopeKind::LogStart => level,
    }
}

// =============================================================================
// Batch mode
// =============================================================================

/// Resolve indent levels, UTC offsets and log-start references for a fully
/// buffered list in canonical order.
pub fn resolve_batch(records: &mut [Record]) {
    let mut thread_levels: HashMap<(SessionId, i32), i32> = HashMap::new();
    let mut offsets: HashMap<SessionId, i32> = HashMap::new();
    let mut log_starts: HashMap<SessionId, RecordKey> = HashMap::new();

    for record in records.iter_mut() {
        let session = record.session;
        let thread = (session, record.thread_id);
        let scope_info = record
            .scope()
            .map(|payload| (payload.kind, payload.level, payload.utc_offset));

        if let Some((kind, level, scope_offset)) = scope_info {
            thread_levels.insert(thread, level);
            record.indent_level = scope_indent(kind, level);
            if kind == ScopeKind::LogStart {
                log_starts.insert(session, record.key());
                offsets.insert(session, scope_offset);
            }
        } else {
            if let Some(offset) = record.utc_offset_override() {
                offsets.insert(session, offset);
            }
            record.indent_level = thread_levels.get(&thread).copied().unwrap_or(0);
        }

        record.utc_offset = offsets.get(&session).copied().unwrap_or(0);
        record.log_start = log_starts.get(&session).copied();
    }
}

// =============================================================================
// Incremental mode
// =============================================================================

/// Resolve the record just inserted at `index` and correct affected
/// successors.
///
/// Later records on the same thread inherit the new record's depth until the
/// next scope marker for that thread, which already re-anchors them; other
/// threads and sessions are untouched. Position never changes, only derived
/// fields.
pub fn resolve_inserted(view: &mut OrderedView, index: usize) {
    let Some(record) = view.get(index) else {
        return;
    };
    let session = record.session;
    let thread_id = record.thread_id;
    let key = record.key();
    let scope_info = record
        .scope()
        .map(|payload| (payload.kind, payload.level, payload.utc_offset));
    let established = record.established_offset();

    // Indent of the inserted record itself.
    let indent = if let Some((kind, level, _)) = scope_info {
        scope_indent(kind, level)
    } else {
        nearest_thread_depth(view, index, session, thread_id)
    };
    if let Some(record) = view.get_mut(index) {
        record.indent_level = indent;
    }

    // Depth that records following this one on the same thread are at. For a
    // scope marker that is its level (the depth inside after an enter, the
    // depth outside after an exit), not its own indent label.
    let anchor = scope_info.map_or(indent, |(_, level, _)| level);
    propagate_forward(view, index, session, thread_id, anchor);

    // Session context: offset and log-start reference.
    let is_log_start = scope_info.is_some_and(|(kind, _, _)| kind == ScopeKind::LogStart);
    let (inherited_start, inherited_offset) = if is_log_start {
        (Some(key), None)
    } else {
        nearest_session_context(view, index, session)
    };
    if let Some(record) = view.get_mut(index) {
        record.log_start = inherited_start;
        record.utc_offset = established.or(inherited_offset).unwrap_or(0);
    }

    // An out-of-order insert that establishes context also rewrites the
    // session records already sitting after it.
    if is_log_start || established.is_some() {
        propagate_session_context(view, index, session, is_log_start.then_some(key), established);
    }
}

/// Depth of `thread_id` just before `index`: the level of the nearest
/// preceding scope marker on that thread, or the indent of the nearest
/// preceding plain record, or zero for an unseen thread.
fn nearest_thread_depth(
    view: &OrderedView,
    index: usize,
    session: SessionId,
    thread_id: i32,
) -> i32 {
    for prev_index in (0..index).rev() {
        let Some(prev) = view.get(prev_index) else {
            break;
        };
        if prev.session == session && prev.thread_id == thread_id {
            return prev
                .scope()
                .map_or(prev.indent_level, |payload| payload.level);
        }
    }
    0
}

/// Correct later same-thread records to `anchor` until the next scope marker
/// for that thread re-anchors them.
fn propagate_forward(
    view: &mut OrderedView,
    index: usize,
    session: SessionId,
    thread_id: i32,
    anchor: i32,
) {
    for next_index in index + 1..view.len() {
        let Some(next) = view.get(next_index) else {
            break;
        };
        if next.session != session || next.thread_id != thread_id {
            continue;
        }
        if next.is_scope() {
            break;
        }
        if let Some(next) = view.get_mut(next_index) {
            next.indent_level = anchor;
        }
    }
}

/// Correct the session context of later same-session records after an
/// insert that establishes it. The new log-start reference holds until the
/// session's next log-start marker, the new offset until the next record
/// that establishes an offset of its own.
fn propagate_session_context(
    view: &mut OrderedView,
    index: usize,
    session: SessionId,
    new_start: Option<RecordKey>,
    new_offset: Option<i32>,
) {
    let mut start = new_start;
    let mut offset = new_offset;
    for next_index in index + 1..view.len() {
        let Some(next) = view.get(next_index) else {
            break;
        };
        if next.session != session {
            continue;
        }
        if next.established_offset().is_some() {
            offset = None;
        }
        if next
            .scope()
            .is_some_and(|payload| payload.kind == ScopeKind::LogStart)
        {
            start = None;
        }
        if start.is_none() && offset.is_none() {
            return;
        }
        if let Some(next) = view.get_mut(next_index) {
            if let Some(reference) = start {
                next.log_start = Some(reference);
            }
            if let Some(minutes) = offset {
                next.utc_offset = minutes;
            }
        }
    }
}

/// Log-start reference and UTC offset carried by the nearest preceding
/// record of the same session.
fn nearest_session_context(
    view: &OrderedView,
    index: usize,
    session: SessionId,
) -> (Option<RecordKey>, Option<i32>) {
    for prev_index in (0..index).rev() {
        let Some(prev) = view.get(prev_index) else {
            break;
        };
        if prev.session == session {
            let start = if prev
                .scope()
                .is_some_and(|payload| payload.kind == ScopeKind::LogStart)
            {
                Some(prev.key())
            } else {
                prev.log_start
            };
            return (start, Some(prev.utc_offset));
        }
    }
    (None, None)
}

// =============================================================================
// Tests
// =============================================================================
