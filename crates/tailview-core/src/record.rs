//! Log record model.
//!
//! A [`Record`] is one structured entry read from a log set: a sequence
//! counter, a timestamp, the logical thread it was emitted on, the session
//! (program run) it belongs to, and a kind-specific payload. Scope records
//! bracket nested operations and drive indentation; a `LogStart` scope opens
//! a session and establishes its UTC offset.
//!
//! Fields under "derived" are not part of the wire form proper: the pipeline
//! stamps them during indent/context resolution after a record has been read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marker prefix in a text record's details that overrides the session's
/// UTC offset (minutes) from that record onward.
pub const UTC_OFFSET_MARKER: &str = "\u{1}UtcOffset=";

// =============================================================================
// Identifiers
// =============================================================================

/// Identifies one run of an instrumented program. All records of a run share
/// one session id and one evolving UTC-offset value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable identity of a record within its session.
///
/// Used as the dedup key for repeated scope markers and as the back-reference
/// to a session's most recent `LogStart` record. A key survives insertions
/// into the ordered view, unlike a positional index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub session: SessionId,
    pub counter: i32,
}

// =============================================================================
// Priority
// =============================================================================

/// Importance of a record, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Trace,
    Checkpoint,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl Priority {
    /// Short human-readable label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Checkpoint => "checkpoint",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Trace
    }
}

// =============================================================================
// Scope payload
// =============================================================================

/// What a scope marker denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Entry into a nested scope. `level` is the depth after entering.
    Enter,
    /// Exit from a nested scope. `level` is the depth after leaving.
    Exit,
    /// Start of a log session. Carries utc_offset for the session.
    LogStart,
}

/// Payload of a scope marker record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopePayload {
    pub kind: ScopeKind,
    /// Nesting depth as recorded by the writer: depth after the increment for
    /// `Enter`, depth after the decrement for `Exit`, zero for `LogStart`.
    pub level: i32,
    /// Scope name (method or operation).
    pub name: String,
    /// True if this marker is a byte-identical re-emission of an earlier
    /// marker, copied into a later rotated file for followers to pick up.
    #[serde(default)]
    pub is_repeated: bool,
    /// Local UTC offset in minutes. Only meaningful for `LogStart`.
    #[serde(default)]
    pub utc_offset: i32,
}

// =============================================================================
// Record kind
// =============================================================================

/// Kind-specific payload of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    /// Plain text message with optional details.
    Text {
        text: String,
        #[serde(default)]
        details: Option<String>,
    },
    /// Named data value.
    Data { name: String, value: String },
    /// Scope marker.
    Scope(ScopePayload),
}

// =============================================================================
// Record
// =============================================================================

/// One structured, ordered log entry.
///
/// Wire fields are immutable after creation; the `indent_level`,
/// `utc_offset` and `log_start` fields are derived by the pipeline's
/// indent/context resolver and may be corrected after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Monotonic-ish sequence counter, wrapping at the `i32` boundary.
    pub counter: i32,
    /// Emission timestamp.
    pub time: DateTime<Utc>,
    pub session: SessionId,
    /// Logical thread of execution within the session.
    pub thread_id: i32,
    #[serde(default)]
    pub priority: Priority,
    pub kind: RecordKind,

    // -- derived, stamped by the pipeline ------------------------------------
    /// Nesting depth of the record's thread at emission time.
    #[serde(default)]
    pub indent_level: i32,
    /// UTC offset in minutes, inherited from the owning session.
    #[serde(default)]
    pub utc_offset: i32,
    /// Key of the session's most recent `LogStart` record at or before this
    /// record, if any.
    #[serde(default)]
    pub log_start: Option<RecordKey>,
}

impl Record {
    /// Create a record with default (unresolved) derived fields.
    #[must_use]
    pub fn new(
        counter: i32,
        time: DateTime<Utc>,
        session: SessionId,
        thread_id: i32,
        kind: RecordKind,
    ) -> Self {
        Self {
            counter,
            time,
            session,
            thread_id,
            priority: Priority::default(),
            kind,
            indent_level: 0,
            utc_offset: 0,
            log_start: None,
        }
    }

    /// Plain text record.
    #[must_use]
    pub fn text(
        counter: i32,
        time: DateTime<Utc>,
        session: SessionId,
        thread_id: i32,
        text: impl Into<String>,
    ) -> Self {
        Self::new(
            counter,
            time,
            session,
            thread_id,
            RecordKind::Text {
                text: text.into(),
                details: None,
            },
        )
    }

    /// Scope-enter marker. `level` is the depth after entering.
    #[must_use]
    pub fn scope_enter(
        counter: i32,
        time: DateTime<Utc>,
        session: SessionId,
        thread_id: i32,
        level: i32,
        name: impl Into<String>,
    ) -> Self {
        Self::new(
            counter,
            time,
            session,
            thread_id,
            RecordKind::Scope(ScopePayload {
                kind: ScopeKind::Enter,
                level,
                name: name.into(),
                is_repeated: false,
                utc_offset: 0,
            }),
        )
    }

    /// Scope-exit marker. `level` is the depth after leaving.
    #[must_use]
    pub fn scope_exit(
        counter: i32,
        time: DateTime<Utc>,
        session: SessionId,
        thread_id: i32,
        level: i32,
        name: impl Into<String>,
    ) -> Self {
        Self::new(
            counter,
            time,
            session,
            thread_id,
            RecordKind::Scope(ScopePayload {
                kind: ScopeKind::Exit,
                level,
                name: name.into(),
                is_repeated: false,
                utc_offset: 0,
            }),
        )
    }

    /// Log-session-start marker carrying the session's UTC offset in minutes.
    #[must_use]
    pub fn log_start(
        counter: i32,
        time: DateTime<Utc>,
        session: SessionId,
        thread_id: i32,
        utc_offset: i32,
    ) -> Self {
        Self::new(
            counter,
            time,
            session,
            thread_id,
            RecordKind::Scope(ScopePayload {
                kind: ScopeKind::LogStart,
                level: 0,
                name: String::new(),
                is_repeated: false,
                utc_offset,
            }),
        )
    }

    /// Set the priority (builder style).
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Stable identity key of this record.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey {
            session: self.session,
            counter: self.counter,
        }
    }

    /// Scope payload, if this is a scope marker.
    #[must_use]
    pub fn scope(&self) -> Option<&ScopePayload> {
        match &self.kind {
            RecordKind::Scope(payload) => Some(payload),
            _ => None,
        }
    }

    /// Whether this record is a scope marker.
    #[must_use]
    pub fn is_scope(&self) -> bool {
        matches!(self.kind, RecordKind::Scope(_))
    }

    /// UTC offset override carried by a text record's details, if present.
    ///
    /// A details payload of the form `"\u{1}UtcOffset=<n>"` changes the
    /// session's offset from this record forward.
    #[must_use]
    pub fn utc_offset_override(&self) -> Option<i32> {
        match &self.kind {
            RecordKind::Text {
                details: Some(details),
                ..
            } => details
                .strip_prefix(UTC_OFFSET_MARKER)
                .and_then(|rest| rest.trim().parse::<i32>().ok()),
            _ => None,
        }
    }

    /// The UTC offset this record itself establishes for its session, if any:
    /// the environment offset of a `LogStart` marker, or a textual override.
    #[must_use]
    pub fn established_offset(&self) -> Option<i32> {
        match self.scope() {
            Some(payload) if payload.kind == ScopeKind::LogStart => Some(payload.utc_offset),
            Some(_) => None,
            None => self.utc_offset_override(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
