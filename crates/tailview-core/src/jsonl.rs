//! JSONL log files: wire codec and rotating-file follower.
//!
//! Instrumented programs write newline-delimited JSON records into a set of
//! rotated files sharing a name prefix, `<prefix>-<n>.jsonl` with `n`
//! increasing per rotation. [`decode_line`]/[`encode_line`] translate between
//! the flat wire form and [`Record`]; [`JsonlLogSet`] is a pipeline source
//! that reads the whole set in rotation order, emits
//! [`SourceEvent::CaughtUp`] whenever it has drained everything currently
//! on disk, and in follow mode keeps polling for appended lines and newly
//! rotated files.
//!
//! Malformed lines are reported in-stream as [`SourceEvent::Error`] and
//! skipped; a torn final line (no trailing newline yet) is left unconsumed
//! until the writer completes it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::FollowConfig;
use crate::error::{DecodeError, SourceError};
use crate::record::{Priority, Record, RecordKind, ScopeKind, ScopePayload, SessionId};
use crate::source::SourceEvent;

/// File extension of log set members.
pub const LOG_EXTENSION: &str = "jsonl";

const MAX_LINE_BYTES: usize = 512 * 1024;

// =============================================================================
// Wire codec
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct WireHead {
    counter: i32,
    ts_ms: i64,
    session: Uuid,
    thread: i32,
    #[serde(default)]
    prio: Priority,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireRecord {
    Text {
        #[serde(flatten)]
        head: WireHead,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Data {
        #[serde(flatten)]
        head: WireHead,
        name: String,
        value: String,
    },
    Scope {
        #[serde(flatten)]
        head: WireHead,
        kind: ScopeKind,
        #[serde(default)]
        level: i32,
        #[serde(default)]
        name: String,
        #[serde(default)]
        repeated: bool,
        #[serde(default)]
        utc_offset: i32,
    },
}

fn record_from_wire(wire: WireRecord) -> Result<Record, String> {
    let (head, kind) = match wire {
        WireRecord::Text { head, text, details } => (head, RecordKind::Text { text, details }),
        WireRecord::Data { head, name, value } => (head, RecordKind::Data { name, value }),
        WireRecord::Scope {
            head,
            kind,
            level,
            name,
            repeated,
            utc_offset,
        } => (
            head,
            RecordKind::Scope(ScopePayload {
                kind,
                level,
                name,
                is_repeated: repeated,
                utc_offset,
            }),
        ),
    };
    let time = chrono::DateTime::from_timestamp_millis(head.ts_ms)
        .ok_or_else(|| format!("timestamp out of range: {}", head.ts_ms))?;
    Ok(
        Record::new(head.counter, time, SessionId(head.session), head.thread, kind)
            .with_priority(head.prio),
    )
}

fn wire_from_record(record: &Record) -> WireRecord {
    let head = WireHead {
        counter: record.counter,
        ts_ms: record.time.timestamp_millis(),
        session: record.session.0,
        thread: record.thread_id,
        prio: record.priority,
    };
    match &record.kind {
        RecordKind::Text { text, details } => WireRecord::Text {
            head,
            text: text.clone(),
            details: details.clone(),
        },
        RecordKind::Data { name, value } => WireRecord::Data {
            head,
            name: name.clone(),
            value: value.clone(),
        },
        RecordKind::Scope(payload) => WireRecord::Scope {
            head,
            kind: payload.kind,
            level: payload.level,
            name: payload.name.clone(),
            repeated: payload.is_repeated,
            utc_offset: payload.utc_offset,
        },
    }
}

/// Decode one JSONL line into a record with unresolved derived fields.
/// `line_number` is 1-based and only used for error reporting.
pub fn decode_line(path: &Path, line_number: u64, line: &str) -> Result<Record, DecodeError> {
    serde_json::from_str(line)
        .map_err(|e| e.to_string())
        .and_then(record_from_wire)
        .map_err(|message| DecodeError::new(path.display().to_string(), line_number, message))
}

/// Encode a record as one JSONL line (no trailing newline). Derived fields
/// are not part of the wire form and are not written.
pub fn encode_line(record: &Record) -> serde_json::Result<String> {
    serde_json::to_string(&wire_from_record(record))
}

// =============================================================================
// Prefix handling
// =============================================================================

/// Extract the set prefix from a member path: `/logs/app-3.jsonl` yields
/// `/logs/app`. Returns `None` if the file name does not follow the
/// `<prefix>-<n>.jsonl` convention.
#[must_use]
pub fn prefix_from_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(&format!(".{LOG_EXTENSION}"))?;
    let (prefix, number) = stem.rsplit_once('-')?;
    if prefix.is_empty() || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(path.with_file_name(prefix))
}

/// Rotation number of a member path, if it follows the naming convention.
fn rotation_number(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(&format!(".{LOG_EXTENSION}"))?;
    let (_, number) = stem.rsplit_once('-')?;
    number.parse().ok()
}

// =============================================================================
// File set follower
// =============================================================================

/// A pipeline source reading a rotated set of JSONL log files.
pub struct JsonlLogSet {
    prefix: PathBuf,
    follow: bool,
    config: FollowConfig,
}

/// Per-file read cursor.
#[derive(Debug, Default, Clone, Copy)]
struct Cursor {
    /// Byte offset of the next unread complete line
    position: u64,
    /// 1-based number of the next unread line
    line: u64,
}

impl JsonlLogSet {
    /// Follow the set identified by `prefix` (`<prefix>-<n>.jsonl`).
    #[must_use]
    pub fn new(prefix: PathBuf, follow: bool, config: FollowConfig) -> Self {
        Self {
            prefix,
            follow,
            config,
        }
    }

    /// Build a set from either a member path (`app-3.jsonl` selects the
    /// whole `app` set) or a bare prefix.
    #[must_use]
    pub fn for_path(path: &Path, follow: bool, config: FollowConfig) -> Self {
        let prefix = prefix_from_path(path).unwrap_or_else(|| path.to_path_buf());
        Self::new(prefix, follow, config)
    }

    #[must_use]
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Member files currently on disk, in rotation order. A bare existing
    /// file at the prefix path itself is treated as a one-file set.
    fn scan(&self) -> std::io::Result<Vec<PathBuf>> {
        if self.prefix.is_file() {
            return Ok(vec![self.prefix.clone()]);
        }

        let dir = match self.prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let Some(base) = self.prefix.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let member_prefix = format!("{base}-");

        let mut members = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with(&member_prefix) && rotation_number(&path).is_some() {
                members.push(path);
            }
        }
        members.sort_by_key(|path| rotation_number(path).unwrap_or(u64::MAX));
        Ok(members)
    }

    /// Read the set until shutdown (follow mode) or until one full drain
    /// (one-shot mode), pushing events into `event_tx`.
    pub async fn run(self, event_tx: mpsc::Sender<SourceEvent>, shutdown: Arc<AtomicBool>) {
        let mut cursors: HashMap<PathBuf, Cursor> = HashMap::new();
        // Starts true so an empty set still reports one initial catch-up.
        let mut was_reading = true;
        let mut members: Vec<PathBuf> = Vec::new();
        let mut last_scan: Option<Instant> = None;

        loop {
            if shutdown.load(Ordering::SeqCst) {
                return;
            }

            // Known members are polled every pass; the directory itself is
            // rescanned for newly rotated files at its own, slower cadence.
            if last_scan.is_none_or(|at| at.elapsed() >= self.config.rescan_interval()) {
                last_scan = Some(Instant::now());
                members = match self.scan() {
                    Ok(members) => members,
                    Err(err) => {
                        let error =
                            SourceError::new(self.prefix.display().to_string(), 0, err.to_string());
                        if event_tx.send(SourceEvent::Error(error)).await.is_err() {
                            return;
                        }
                        Vec::new()
                    }
                };
                cursors.retain(|path, _| members.contains(path));
            }

            let mut read_any = false;
            for path in &members {
                let cursor = cursors.entry(path.clone()).or_default();
                match drain_file(path, cursor, &event_tx, &shutdown).await {
                    Ok(progress) => read_any |= progress,
                    Err(DrainAbort) => return,
                }
            }

            if read_any {
                was_reading = true;
                continue;
            }

            if was_reading {
                was_reading = false;
                if event_tx.send(SourceEvent::CaughtUp).await.is_err() {
                    return;
                }
                if !self.follow {
                    let _ = event_tx.send(SourceEvent::Eof).await;
                    return;
                }
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }
}

/// The receiver went away or shutdown was raised mid-file.
struct DrainAbort;

/// Read all complete lines past `cursor`, emitting decoded records and
/// in-stream decode errors. Returns whether any bytes were consumed.
async fn drain_file(
    path: &Path,
    cursor: &mut Cursor,
    event_tx: &mpsc::Sender<SourceEvent>,
    shutdown: &Arc<AtomicBool>,
) -> Result<bool, DrainAbort> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            // Rotated away between scan and open. Forget the cursor so a
            // reappearing file of the same name starts fresh.
            debug!(path = %path.display(), error = %err, "log file vanished, skipping");
            *cursor = Cursor::default();
            return Ok(false);
        }
    };

    let len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to stat log file");
            return Ok(false);
        }
    };
    if len < cursor.position {
        warn!(path = %path.display(), "log file truncated, restarting from the beginning");
        *cursor = Cursor::default();
    }
    if len == cursor.position {
        return Ok(false);
    }

    let mut reader = BufReader::new(file);
    if reader
        .seek(std::io::SeekFrom::Start(cursor.position))
        .await
        .is_err()
    {
        return Ok(false);
    }

    let mut progressed = false;
    let mut line = String::new();
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return Err(DrainAbort);
        }

        line.clear();
        let read = match reader.read_line(&mut line).await {
            Ok(read) => read,
            Err(err) => {
                let error =
                    SourceError::new(path.display().to_string(), cursor.position, err.to_string());
                if event_tx.send(SourceEvent::Error(error)).await.is_err() {
                    return Err(DrainAbort);
                }
                return Ok(progressed);
            }
        };
        if read == 0 {
            return Ok(progressed);
        }
        if !line.ends_with('\n') {
            // Torn tail the writer has not finished; re-read next pass.
            return Ok(progressed);
        }

        let start = cursor.position;
        cursor.position += read as u64;
        cursor.line += 1;
        progressed = true;

        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.len() > MAX_LINE_BYTES {
            warn!(path = %path.display(), len = trimmed.len(), "log line too large, dropping");
            continue;
        }

        let event = match decode_line(path, cursor.line - 1, trimmed) {
            Ok(record) => SourceEvent::Record(record),
            Err(err) => SourceEvent::Error(SourceError::decode(&err, start)),
        };
        if event_tx.send(event).await.is_err() {
            return Err(DrainAbort);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::io::Write as _;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    fn session() -> SessionId {
        SessionId(Uuid::from_u128(7))
    }

    // -- Codec ------------------------------------------------------------------

    fn decode(line: &str) -> Result<Record, DecodeError> {
        decode_line(Path::new("app-1.jsonl"), 1, line)
    }

    #[test]
    fn text_record_roundtrip() {
        let record = Record::text(5, ts(100), session(), 3, "hello").with_priority(Priority::Error);
        let line = encode_line(&record).unwrap();
        let decoded = decode(&line).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn scope_record_roundtrip() {
        let record = Record::scope_enter(9, ts(100), session(), 2, 4, "load_config");
        let line = encode_line(&record).unwrap();
        assert_eq!(decode(&line).unwrap(), record);
    }

    #[test]
    fn log_start_roundtrip_keeps_offset() {
        let record = Record::log_start(1, ts(50), session(), 1, -120);
        let line = encode_line(&record).unwrap();
        let decoded = decode(&line).unwrap();
        assert_eq!(decoded.scope().unwrap().utc_offset, -120);
    }

    #[test]
    fn decode_minimal_wire_fields() {
        let line = format!(
            r#"{{"type":"text","counter":1,"ts_ms":1000,"session":"{}","thread":2,"text":"x"}}"#,
            Uuid::from_u128(7)
        );
        let record = decode(&line).unwrap();
        assert_eq!(record.priority, Priority::Trace);
        assert_eq!(record.counter, 1);
        assert!(matches!(record.kind, RecordKind::Text { .. }));
    }

    #[test]
    fn decode_rejects_garbage_and_bad_timestamp() {
        let err = decode_line(Path::new("app-1.jsonl"), 7, "not json").unwrap_err();
        assert!(err.path.ends_with("app-1.jsonl"));
        assert_eq!(err.line, 7);

        let line = format!(
            r#"{{"type":"text","counter":1,"ts_ms":{},"session":"{}","thread":2,"text":"x"}}"#,
            i64::MAX,
            Uuid::from_u128(7)
        );
        let err = decode(&line).unwrap_err();
        assert!(err.message.contains("timestamp out of range"));
    }

    #[test]
    fn derived_fields_not_on_the_wire() {
        let mut record = Record::text(5, ts(100), session(), 3, "hello");
        record.indent_level = 4;
        record.utc_offset = 60;
        let line = encode_line(&record).unwrap();
        assert!(!line.contains("indent_level"));
        let decoded = decode(&line).unwrap();
        assert_eq!(decoded.indent_level, 0);
        assert_eq!(decoded.utc_offset, 0);
    }

    // -- Prefix handling --------------------------------------------------------

    #[test]
    fn prefix_extraction() {
        assert_eq!(
            prefix_from_path(Path::new("/logs/app-web-3.jsonl")),
            Some(PathBuf::from("/logs/app-web"))
        );
        assert_eq!(
            prefix_from_path(Path::new("app-0.jsonl")),
            Some(PathBuf::from("app"))
        );
        assert_eq!(prefix_from_path(Path::new("/logs/app.jsonl")), None);
        assert_eq!(prefix_from_path(Path::new("/logs/app-x.jsonl")), None);
        assert_eq!(prefix_from_path(Path::new("/logs/app-3.txt")), None);
    }

    #[test]
    fn rotation_numbers_sort_numerically() {
        assert_eq!(rotation_number(Path::new("app-2.jsonl")), Some(2));
        assert_eq!(rotation_number(Path::new("app-10.jsonl")), Some(10));
        assert_eq!(rotation_number(Path::new("app.jsonl")), None);
    }

    // -- Follower ---------------------------------------------------------------

    fn write_lines(path: &Path, records: &[Record]) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for record in records {
            writeln!(file, "{}", encode_line(record).unwrap()).unwrap();
        }
    }

    async fn collect_one_shot(set: JsonlLogSet) -> Vec<SourceEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        let shutdown = Arc::new(AtomicBool::new(false));
        set.run(tx, shutdown).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn one_shot_reads_set_in_rotation_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let r1 = Record::text(1, ts(10), session(), 1, "first");
        let r2 = Record::text(2, ts(20), session(), 1, "second");
        let r3 = Record::text(3, ts(30), session(), 1, "third");
        write_lines(&tmp.path().join("app-1.jsonl"), &[r1.clone(), r2.clone()]);
        write_lines(&tmp.path().join("app-2.jsonl"), &[r3.clone()]);

        let set = JsonlLogSet::new(tmp.path().join("app"), false, FollowConfig::default());
        let events = collect_one_shot(set).await;

        assert_eq!(
            events,
            vec![
                SourceEvent::Record(r1),
                SourceEvent::Record(r2),
                SourceEvent::Record(r3),
                SourceEvent::CaughtUp,
                SourceEvent::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn empty_set_still_reports_catch_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let set = JsonlLogSet::new(tmp.path().join("app"), false, FollowConfig::default());
        let events = collect_one_shot(set).await;
        assert_eq!(events, vec![SourceEvent::CaughtUp, SourceEvent::Eof]);
    }

    #[tokio::test]
    async fn member_path_selects_whole_set() {
        let tmp = tempfile::TempDir::new().unwrap();
        let r1 = Record::text(1, ts(10), session(), 1, "first");
        let r2 = Record::text(2, ts(20), session(), 1, "second");
        write_lines(&tmp.path().join("app-1.jsonl"), &[r1.clone()]);
        write_lines(&tmp.path().join("app-2.jsonl"), &[r2.clone()]);

        let set = JsonlLogSet::for_path(
            &tmp.path().join("app-2.jsonl"),
            false,
            FollowConfig::default(),
        );
        let events = collect_one_shot(set).await;
        assert_eq!(events.len(), 4, "both members plus CaughtUp and Eof");
        assert_eq!(events[0], SourceEvent::Record(r1));
        assert_eq!(events[1], SourceEvent::Record(r2));
    }

    #[tokio::test]
    async fn malformed_line_reported_in_stream_and_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("app-1.jsonl");
        let good = Record::text(2, ts(20), session(), 1, "good");
        std::fs::write(
            &path,
            format!("this is not json\n{}\n", encode_line(&good).unwrap()),
        )
        .unwrap();

        let set = JsonlLogSet::new(tmp.path().join("app"), false, FollowConfig::default());
        let events = collect_one_shot(set).await;

        match &events[0] {
            SourceEvent::Error(err) => {
                assert!(err.path.ends_with("app-1.jsonl"));
                assert_eq!(err.position, 0);
                assert!(err.message.starts_with("line 1:"));
            }
            other => panic!("expected error event, got {other:?}"),
        }
        assert_eq!(events[1], SourceEvent::Record(good));
    }

    #[tokio::test]
    async fn torn_tail_line_not_emitted_until_completed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("app-1.jsonl");
        let record = Record::text(1, ts(10), session(), 1, "partial");
        let encoded = encode_line(&record).unwrap();
        // No trailing newline yet.
        std::fs::write(&path, &encoded).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut cursor = Cursor::default();
        assert!(!drain_file(&path, &mut cursor, &tx, &shutdown).await.is_ok_and(|p| p));
        assert!(rx.try_recv().is_err());

        // Writer completes the line.
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file).unwrap();
        assert!(drain_file(&path, &mut cursor, &tx, &shutdown).await.is_ok_and(|p| p));
        assert_eq!(rx.try_recv().unwrap(), SourceEvent::Record(record));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn follow_mode_picks_up_appends_and_rotations() {
        let tmp = tempfile::TempDir::new().unwrap();
        let first = Record::text(1, ts(10), session(), 1, "first");
        write_lines(&tmp.path().join("app-1.jsonl"), &[first.clone()]);

        let config = FollowConfig {
            poll_interval_ms: 5,
            rescan_interval_ms: 5,
        };
        let set = JsonlLogSet::new(tmp.path().join("app"), true, config);
        let (tx, mut rx) = mpsc::channel(64);
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(set.run(tx, Arc::clone(&shutdown)));

        async fn recv(rx: &mut mpsc::Receiver<SourceEvent>) -> SourceEvent {
            tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("source ended unexpectedly")
        }

        assert_eq!(recv(&mut rx).await, SourceEvent::Record(first));
        assert_eq!(recv(&mut rx).await, SourceEvent::CaughtUp);

        // Append to the live file.
        let appended = Record::text(2, ts(20), session(), 1, "appended");
        write_lines(&tmp.path().join("app-1.jsonl"), &[appended.clone()]);
        assert_eq!(recv(&mut rx).await, SourceEvent::Record(appended));
        assert_eq!(recv(&mut rx).await, SourceEvent::CaughtUp);

        // Rotate: a new member appears.
        let rotated = Record::text(3, ts(30), session(), 1, "rotated");
        write_lines(&tmp.path().join("app-2.jsonl"), &[rotated.clone()]);
        assert_eq!(recv(&mut rx).await, SourceEvent::Record(rotated));
        assert_eq!(recv(&mut rx).await, SourceEvent::CaughtUp);

        shutdown.store(true, Ordering::SeqCst);
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rotated_files_wait_for_the_rescan_interval() {
        let tmp = tempfile::TempDir::new().unwrap();
        let first = Record::text(1, ts(10), session(), 1, "first");
        write_lines(&tmp.path().join("app-1.jsonl"), &[first.clone()]);

        // Appends are polled fast, the directory rescan effectively never
        // happens again within the test.
        let config = FollowConfig {
            poll_interval_ms: 5,
            rescan_interval_ms: 60_000,
        };
        let set = JsonlLogSet::new(tmp.path().join("app"), true, config);
        let (tx, mut rx) = mpsc::channel(64);
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(set.run(tx, Arc::clone(&shutdown)));

        async fn recv(rx: &mut mpsc::Receiver<SourceEvent>) -> SourceEvent {
            tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("source ended unexpectedly")
        }

        assert_eq!(recv(&mut rx).await, SourceEvent::Record(first));
        assert_eq!(recv(&mut rx).await, SourceEvent::CaughtUp);

        // A known member still gets its appends at poll cadence.
        let appended = Record::text(2, ts(20), session(), 1, "appended");
        write_lines(&tmp.path().join("app-1.jsonl"), &[appended.clone()]);
        assert_eq!(recv(&mut rx).await, SourceEvent::Record(appended));
        assert_eq!(recv(&mut rx).await, SourceEvent::CaughtUp);

        // A freshly rotated member is not discovered before the rescan.
        write_lines(
            &tmp.path().join("app-2.jsonl"),
            &[Record::text(3, ts(30), session(), 1, "rotated")],
        );
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err(), "new member seen before a rescan was due");

        shutdown.store(true, Ordering::SeqCst);
        handle.await.unwrap();
    }
}
