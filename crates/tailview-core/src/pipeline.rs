//! Adaptive producer/consumer merge pipeline.
//!
//! The pipeline turns a stream of [`SourceEvent`]s into a continuously
//! ordered, resolved [`SharedView`]. Two tasks cooperate:
//!
//! - The **producer** owns the source stream. While catching up on
//!   historical data it collects records into a private sorted buffer and
//!   hands the whole resolved batch off in one atomic view replacement.
//!   Once live, it dispatches records one at a time, but never lets more
//!   than `congestion_ceiling` dispatches be in flight.
//! - The **consumer** applies dispatched records to the shared view,
//!   resolves each insertion incrementally, and drives an application-side
//!   [`ViewSink`]. When its queue stays non-empty longer than
//!   `busy_threshold`, it raises a [`HandbackSignal`]; the producer then
//!   waits for in-flight dispatches to drain, seeds a fresh private buffer
//!   from a snapshot of the view, and buffers until the source next catches
//!   up. No record is lost or applied twice across the mode switch.
//!
//! Scope-marker duplicates (re-emitted markers in rotated files) are
//! filtered by the producer before either path sees them, so batch and
//! live mode present identical contents.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace};

use crate::config::PipelineConfig;
use crate::dedup::ScopeDeduper;
use crate::error::{Error, SourceError};
use crate::indent::{resolve_batch, resolve_inserted};
use crate::record::Record;
use crate::source::SourceEvent;
use crate::view::SharedView;

// =============================================================================
// Sink and notices
// =============================================================================

/// Application-visible pipeline transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Historical catch-up finished; the view now holds the full backlog.
    InitialLoadComplete { records: usize },
    /// The consumer fell behind and the stream went back to private
    /// buffering.
    BufferingAgain,
    /// Periodic progress while buffering.
    Progress { buffered: usize },
    /// A buffering episode ended with an atomic view replacement.
    BufferingComplete { records: usize },
    /// A source failure, reported in-stream.
    SourceError { error: SourceError },
    /// The pipeline has shut down; no further callbacks will arrive.
    Closed,
}

/// Receives view changes and pipeline notices on the consumer task.
///
/// All methods have no-op defaults so a sink only implements what it cares
/// about. `insert_one` reports the resolved record and its position; an
/// insertion may also correct the indent of later records on the same
/// thread, which is visible through the shared view.
pub trait ViewSink: Send + 'static {
    fn insert_one(&mut self, _index: usize, _record: &Record) {}
    fn replace_all(&mut self, _records: &[Record]) {}
    fn notice(&mut self, _notice: Notice) {}
}

/// Notices only, forwarded into a channel. Convenient for tests and CLIs
/// that poll the shared view directly.
impl ViewSink for mpsc::UnboundedSender<Notice> {
    fn notice(&mut self, notice: Notice) {
        let _ = self.send(notice);
    }
}

/// A sink that ignores everything.
impl ViewSink for () {}

// =============================================================================
// State
// =============================================================================

/// Which side currently owns the record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Initial historical catch-up
    Loading,
    /// Record-at-a-time dispatch into the shared view
    Live,
    /// The producer took the stream back and is buffering privately
    Buffering,
    /// The pipeline has ended
    Closed,
}

/// Observable pipeline state, published through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub mode: Mode,
    /// Records currently in the shared view
    pub records: usize,
    /// Dispatches sent but not yet applied
    pub pending: usize,
    /// Records in the producer's private buffer (progress granularity)
    pub buffered: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            mode: Mode::Loading,
            records: 0,
            pending: 0,
            buffered: 0,
        }
    }
}

/// One-shot latch the consumer raises to ask the producer to take the
/// stream back. Consumed (and reset) by the producer.
#[derive(Debug, Default)]
pub struct HandbackSignal(AtomicBool);

impl HandbackSignal {
    /// Raise the request. Idempotent until taken.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a request is outstanding.
    #[must_use]
    pub fn requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consume an outstanding request, resetting the latch.
    #[must_use]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Producer-to-consumer protocol. Record dispatches are counted in
/// `pending`; everything else rides the same ordered channel uncounted.
#[derive(Debug)]
enum Msg {
    Insert(Record),
    Buffering,
    Progress(usize),
    Handoff(Vec<Record>),
    CatchUp,
    SourceError(SourceError),
    Closed,
}

// =============================================================================
// Pipeline handle
// =============================================================================

/// Handle to a running merge pipeline.
pub struct Pipeline {
    view: SharedView,
    state_rx: watch::Receiver<ViewState>,
    shutdown: Arc<AtomicBool>,
    pending: Arc<AtomicUsize>,
    handback: Arc<HandbackSignal>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl Pipeline {
    /// Spawn the producer and consumer tasks over a source event stream.
    ///
    /// The caller runs the source itself (see [`crate::jsonl::JsonlLogSet`]
    /// or [`crate::source::ScriptedSource`]), sharing [`Self::shutdown_flag`]
    /// so [`Self::close`] stops it too.
    #[must_use]
    pub fn spawn<S: ViewSink>(
        config: PipelineConfig,
        source_rx: mpsc::Receiver<SourceEvent>,
        sink: S,
    ) -> Self {
        let view = crate::view::shared();
        let shutdown = Arc::new(AtomicBool::new(false));
        let pending = Arc::new(AtomicUsize::new(0));
        let handback = Arc::new(HandbackSignal::default());
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ViewState::default());

        let producer = Producer {
            source_rx,
            msg_tx,
            view: Arc::clone(&view),
            pending: Arc::clone(&pending),
            handback: Arc::clone(&handback),
            shutdown: Arc::clone(&shutdown),
            deduper: ScopeDeduper::new(),
            // The initial catch-up always buffers.
            buffer: Some(Vec::new()),
            config: config.clone(),
        };
        let consumer = Consumer {
            msg_rx,
            view: Arc::clone(&view),
            sink,
            pending: Arc::clone(&pending),
            handback: Arc::clone(&handback),
            state_tx,
            busy_since: None,
            busy_threshold: config.busy_threshold(),
            initial_done: false,
        };

        Self {
            view,
            state_rx,
            shutdown,
            pending,
            handback,
            producer: tokio::spawn(producer.run()),
            consumer: tokio::spawn(consumer.run()),
        }
    }

    /// The continuously ordered, resolved record view.
    #[must_use]
    pub fn view(&self) -> SharedView {
        Arc::clone(&self.view)
    }

    /// Current observable state.
    #[must_use]
    pub fn state(&self) -> ViewState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ViewState> {
        self.state_rx.clone()
    }

    /// Dispatches sent to the consumer but not yet applied. Never exceeds
    /// the configured congestion ceiling.
    #[must_use]
    pub fn pending_dispatches(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Shared stop flag; hand this to the source task.
    #[must_use]
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Ask both tasks to stop. Buffered-but-unhanded records are discarded,
    /// as is any handback request still latched.
    pub fn close(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.handback.take();
    }

    /// Wait for both tasks to finish.
    pub async fn join(self) -> crate::Result<()> {
        self.producer
            .await
            .map_err(|e| Error::Runtime(format!("producer task failed: {e}")))?;
        self.consumer
            .await
            .map_err(|e| Error::Runtime(format!("consumer task failed: {e}")))?;
        Ok(())
    }
}

// =============================================================================
// Producer
// =============================================================================

struct Producer {
    source_rx: mpsc::Receiver<SourceEvent>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    view: SharedView,
    pending: Arc<AtomicUsize>,
    handback: Arc<HandbackSignal>,
    shutdown: Arc<AtomicBool>,
    deduper: ScopeDeduper,
    /// `Some` while the producer owns the stream and buffers privately.
    buffer: Option<Vec<Record>>,
    config: PipelineConfig,
}

impl Producer {
    async fn run(mut self) {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            match timeout(self.config.drain_poll_interval(), self.source_rx.recv()).await {
                Err(_) => {} // idle, loop to check the shutdown flag
                Ok(None) | Ok(Some(SourceEvent::Eof)) => {
                    self.flush_and_close();
                    return;
                }
                Ok(Some(SourceEvent::Record(record))) => self.handle_record(record).await,
                Ok(Some(SourceEvent::CaughtUp)) => self.handle_caught_up(),
                Ok(Some(SourceEvent::Error(error))) => {
                    let _ = self.msg_tx.send(Msg::SourceError(error));
                }
            }
        }
    }

    async fn handle_record(&mut self, record: Record) {
        if !self.deduper.accept(&record) {
            trace!(session = %record.session, counter = record.counter, "dropping repeated scope marker");
            return;
        }

        if self.buffer.is_none() {
            // Honor an outstanding handback request, otherwise wait for
            // dispatch room.
            loop {
                if self.shutdown.load(Ordering::SeqCst) || self.msg_tx.is_closed() {
                    return;
                }
                if self.handback.take() {
                    self.reclaim().await;
                    break;
                }
                if self.pending.load(Ordering::SeqCst) < self.config.congestion_ceiling {
                    break;
                }
                sleep(self.config.drain_poll_interval()).await;
            }
        }

        if let Some(buffer) = self.buffer.as_mut() {
            crate::order::insert_sorted(buffer, record);
            if buffer.len() % self.config.progress_every == 0 {
                let _ = self.msg_tx.send(Msg::Progress(buffer.len()));
            }
        } else {
            self.pending.fetch_add(1, Ordering::SeqCst);
            if self.msg_tx.send(Msg::Insert(record)).is_err() {
                self.shutdown.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Take the stream back: wait for every in-flight dispatch to be
    /// applied, then seed a private buffer from the settled view.
    async fn reclaim(&mut self) {
        let _ = self.msg_tx.send(Msg::Buffering);
        while self.pending.load(Ordering::SeqCst) > 0 {
            if self.shutdown.load(Ordering::SeqCst) || self.msg_tx.is_closed() {
                return;
            }
            sleep(self.config.drain_poll_interval()).await;
        }
        let seed = self
            .view
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot();
        info!(seeded = seed.len(), "stream taken back, buffering privately");
        self.buffer = Some(seed);
    }

    fn handle_caught_up(&mut self) {
        // A request still latched here is satisfied either way: a handoff
        // replaces the backlog it pointed at, and a drained stream has
        // nothing to take back.
        let requested = self.handback.take();
        if let Some(mut records) = self.buffer.take() {
            resolve_batch(&mut records);
            info!(records = records.len(), "catch-up complete, handing buffer off");
            let _ = self.msg_tx.send(Msg::Handoff(records));
        } else {
            if requested {
                debug!("handback requested but the stream is already drained");
            }
            let _ = self.msg_tx.send(Msg::CatchUp);
        }
    }

    fn flush_and_close(&mut self) {
        if let Some(mut records) = self.buffer.take() {
            resolve_batch(&mut records);
            let _ = self.msg_tx.send(Msg::Handoff(records));
        }
        let _ = self.msg_tx.send(Msg::Closed);
    }
}

// =============================================================================
// Consumer
// =============================================================================

struct Consumer<S: ViewSink> {
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    view: SharedView,
    sink: S,
    pending: Arc<AtomicUsize>,
    handback: Arc<HandbackSignal>,
    state_tx: watch::Sender<ViewState>,
    /// Set while the queue has stayed non-empty between inserts.
    busy_since: Option<Instant>,
    busy_threshold: Duration,
    initial_done: bool,
}

impl<S: ViewSink> Consumer<S> {
    async fn run(mut self) {
        while let Some(msg) = self.msg_rx.recv().await {
            match msg {
                Msg::Insert(record) => self.apply_insert(record),
                Msg::Buffering => {
                    self.busy_since = None;
                    self.state_tx.send_modify(|s| s.mode = Mode::Buffering);
                    self.sink.notice(Notice::BufferingAgain);
                }
                Msg::Progress(buffered) => {
                    self.state_tx.send_modify(|s| s.buffered = buffered);
                    self.sink.notice(Notice::Progress { buffered });
                }
                Msg::Handoff(records) => self.apply_handoff(records),
                Msg::CatchUp => self.busy_since = None,
                Msg::SourceError(error) => self.sink.notice(Notice::SourceError { error }),
                Msg::Closed => break,
            }
        }
        self.state_tx.send_modify(|s| {
            s.mode = Mode::Closed;
            s.pending = 0;
        });
        self.sink.notice(Notice::Closed);
    }

    fn apply_insert(&mut self, record: Record) {
        let (index, resolved, len) = {
            let mut view = self.view.write().unwrap_or_else(|e| e.into_inner());
            let index = view.insert_sorted(record);
            resolve_inserted(&mut view, index);
            (index, view.get(index).cloned(), view.len())
        };
        self.pending.fetch_sub(1, Ordering::SeqCst);
        let pending = self.pending.load(Ordering::SeqCst);
        self.state_tx.send_modify(|s| {
            s.records = len;
            s.pending = pending;
        });
        if let Some(record) = resolved {
            self.sink.insert_one(index, &record);
        }

        if self.msg_rx.is_empty() {
            self.busy_since = None;
        } else {
            let since = *self.busy_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= self.busy_threshold && !self.handback.requested() {
                debug!("falling behind, asking the reader to take the stream back");
                self.handback.request();
            }
        }
    }

    fn apply_handoff(&mut self, records: Vec<Record>) {
        let len = records.len();
        let snapshot = {
            let mut view = self.view.write().unwrap_or_else(|e| e.into_inner());
            view.replace(records);
            view.snapshot()
        };
        self.busy_since = None;
        self.state_tx.send_modify(|s| {
            s.mode = Mode::Live;
            s.records = len;
            s.buffered = 0;
        });
        self.sink.replace_all(&snapshot);
        let notice = if self.initial_done {
            Notice::BufferingComplete { records: len }
        } else {
            self.initial_done = true;
            Notice::InitialLoadComplete { records: len }
        };
        self.sink.notice(notice);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, SessionId};
    use crate::source::ScriptedSource;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    fn session() -> SessionId {
        SessionId(uuid::Uuid::from_u128(42))
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            congestion_ceiling: 20,
            busy_threshold_ms: 10_000,
            progress_every: 5000,
            drain_poll_interval_ms: 1,
        }
    }

    /// Records notices and per-insert indices behind shared handles.
    #[derive(Default, Clone)]
    struct RecordingSink {
        notices: Arc<Mutex<Vec<Notice>>>,
        inserts: Arc<Mutex<Vec<(usize, Record)>>>,
    }

    impl RecordingSink {
        fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }

        fn inserts(&self) -> Vec<(usize, Record)> {
            self.inserts.lock().unwrap().clone()
        }
    }

    impl ViewSink for RecordingSink {
        fn insert_one(&mut self, index: usize, record: &Record) {
            self.inserts.lock().unwrap().push((index, record.clone()));
        }

        fn notice(&mut self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    async fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            sleep(Duration::from_millis(2)).await;
        }
    }

    fn spawn_scripted(
        events: Vec<SourceEvent>,
        config: PipelineConfig,
        sink: RecordingSink,
    ) -> Pipeline {
        let (tx, rx) = mpsc::channel(64);
        let pipeline = Pipeline::spawn(config, rx, sink);
        tokio::spawn(ScriptedSource::new(events).run(tx, pipeline.shutdown_flag()));
        pipeline
    }

    // -- HandbackSignal ---------------------------------------------------------

    #[test]
    fn handback_signal_take_resets() {
        let signal = HandbackSignal::default();
        assert!(!signal.requested());
        assert!(!signal.take());

        signal.request();
        signal.request();
        assert!(signal.requested());
        assert!(signal.take());
        assert!(!signal.requested());
        assert!(!signal.take());
    }

    // -- ViewState --------------------------------------------------------------

    #[test]
    fn view_state_default_and_serde() {
        let state = ViewState::default();
        assert_eq!(state.mode, Mode::Loading);

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"loading\""));
        let parsed: ViewState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn notice_serde_is_tagged() {
        let json = serde_json::to_string(&Notice::Progress { buffered: 10_000 }).unwrap();
        assert!(json.contains("\"kind\":\"progress\""));
        let parsed: Notice = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Notice::Progress { buffered: 10_000 });
    }

    // -- Initial load -----------------------------------------------------------

    #[tokio::test]
    async fn initial_load_hands_off_resolved_batch() {
        let s = session();
        let events = vec![
            SourceEvent::Record(Record::scope_enter(1, ts(10), s, 1, 1, "op")),
            SourceEvent::Record(Record::text(2, ts(20), s, 1, "inside a")),
            SourceEvent::Record(Record::text(3, ts(30), s, 1, "inside b")),
            SourceEvent::Record(Record::scope_exit(4, ts(40), s, 1, 0, "op")),
            SourceEvent::Record(Record::text(5, ts(50), s, 1, "after")),
            SourceEvent::CaughtUp,
        ];
        let sink = RecordingSink::default();
        let pipeline = spawn_scripted(events, fast_config(), sink.clone());

        wait_for("initial load", || {
            sink.notices()
                .iter()
                .any(|n| matches!(n, Notice::InitialLoadComplete { .. }))
        })
        .await;

        let view = pipeline.view();
        {
            let view = view.read().unwrap();
            assert_eq!(view.len(), 5);
            let levels: Vec<i32> = view.iter().map(|r| r.indent_level).collect();
            assert_eq!(levels, vec![0, 1, 1, 0, 0]);
        }
        assert_eq!(pipeline.state().mode, Mode::Live);
        assert!(
            sink.inserts().is_empty(),
            "initial load arrives as one replacement, not per-record inserts"
        );

        pipeline.close();
        pipeline.join().await.unwrap();
    }

    #[tokio::test]
    async fn records_out_of_order_are_merged_sorted() {
        let s = session();
        let events = vec![
            SourceEvent::Record(Record::text(3, ts(30), s, 1, "third")),
            SourceEvent::Record(Record::text(1, ts(10), s, 1, "first")),
            SourceEvent::Record(Record::text(2, ts(20), s, 1, "second")),
            SourceEvent::CaughtUp,
        ];
        let sink = RecordingSink::default();
        let pipeline = spawn_scripted(events, fast_config(), sink.clone());

        wait_for("initial load", || {
            sink.notices()
                .iter()
                .any(|n| matches!(n, Notice::InitialLoadComplete { records: 3 }))
        })
        .await;

        let view = pipeline.view();
        let counters: Vec<i32> = view.read().unwrap().iter().map(|r| r.counter).collect();
        assert_eq!(counters, vec![1, 2, 3]);

        pipeline.close();
        pipeline.join().await.unwrap();
    }

    // -- Live dispatch ----------------------------------------------------------

    #[tokio::test]
    async fn live_records_are_inserted_and_resolved_one_at_a_time() {
        let s = session();
        let events = vec![
            SourceEvent::CaughtUp, // empty backlog, go live immediately
            SourceEvent::Record(Record::scope_enter(1, ts(10), s, 1, 1, "op")),
            SourceEvent::Record(Record::text(2, ts(20), s, 1, "inside")),
        ];
        let sink = RecordingSink::default();
        let pipeline = spawn_scripted(events, fast_config(), sink.clone());

        let view = pipeline.view();
        wait_for("live inserts", || view.read().unwrap().len() == 2).await;

        {
            let view = view.read().unwrap();
            assert_eq!(view.get(0).unwrap().indent_level, 0);
            assert_eq!(view.get(1).unwrap().indent_level, 1);
        }
        assert_eq!(sink.inserts().len(), 2);
        assert_eq!(sink.inserts()[1].1.indent_level, 1, "sink sees resolved records");

        pipeline.close();
        pipeline.join().await.unwrap();
    }

    #[tokio::test]
    async fn repeated_scope_markers_are_dropped_across_modes() {
        let s = session();
        let mut repeated = Record::scope_enter(1, ts(10), s, 1, 1, "op");
        if let crate::record::RecordKind::Scope(payload) = &mut repeated.kind {
            payload.is_repeated = true;
        }
        let events = vec![
            SourceEvent::Record(repeated.clone()),
            SourceEvent::CaughtUp,
            // Same marker re-emitted in a later rotated file, now live.
            SourceEvent::Record(repeated.clone()),
            SourceEvent::Record(Record::text(2, ts(20), s, 1, "next")),
        ];
        let sink = RecordingSink::default();
        let pipeline = spawn_scripted(events, fast_config(), sink.clone());

        let view = pipeline.view();
        wait_for("text record", || view.read().unwrap().len() == 2).await;

        let counters: Vec<i32> = view.read().unwrap().iter().map(|r| r.counter).collect();
        assert_eq!(counters, vec![1, 2], "repeated marker applied exactly once");

        pipeline.close();
        pipeline.join().await.unwrap();
    }

    #[tokio::test]
    async fn source_errors_surface_as_notices() {
        let s = session();
        let error = SourceError::new("app-1.jsonl", 128, "torn read");
        let events = vec![
            SourceEvent::Record(Record::text(1, ts(10), s, 1, "ok")),
            SourceEvent::Error(error.clone()),
            SourceEvent::CaughtUp,
        ];
        let sink = RecordingSink::default();
        let pipeline = spawn_scripted(events, fast_config(), sink.clone());

        wait_for("error notice", || {
            sink.notices()
                .iter()
                .any(|n| matches!(n, Notice::SourceError { .. }))
        })
        .await;

        let notices = sink.notices();
        let error_pos = notices
            .iter()
            .position(|n| n == &Notice::SourceError { error: error.clone() })
            .unwrap();
        // Errors bypass the private buffer and arrive before the handoff.
        assert!(
            !notices[..error_pos]
                .iter()
                .any(|n| matches!(n, Notice::InitialLoadComplete { .. })),
            "error should not wait for the initial handoff"
        );

        pipeline.close();
        pipeline.join().await.unwrap();
    }

    #[tokio::test]
    async fn eof_flushes_buffer_and_closes() {
        let s = session();
        // ScriptedSource appends Eof itself; no CaughtUp before it.
        let events = vec![SourceEvent::Record(Record::text(1, ts(10), s, 1, "only"))];
        let sink = RecordingSink::default();
        let pipeline = spawn_scripted(events, fast_config(), sink.clone());

        wait_for("closed notice", || {
            sink.notices().iter().any(|n| matches!(n, Notice::Closed))
        })
        .await;

        let notices = sink.notices();
        assert!(notices.contains(&Notice::InitialLoadComplete { records: 1 }));
        assert_eq!(notices.last(), Some(&Notice::Closed));
        assert_eq!(pipeline.state().mode, Mode::Closed);
        assert_eq!(pipeline.view().read().unwrap().len(), 1);

        pipeline.join().await.unwrap();
    }

    #[tokio::test]
    async fn moot_handback_is_dropped_at_catch_up() {
        let s = session();
        let events = vec![
            SourceEvent::CaughtUp,
            SourceEvent::Record(Record::text(1, ts(10), s, 1, "a")),
            SourceEvent::CaughtUp,
        ];
        let sink = RecordingSink::default();
        // busy_threshold 0 makes any queued backlog raise a handback request;
        // with a single record none should ever be raised or honored.
        let config = PipelineConfig {
            busy_threshold_ms: 0,
            ..fast_config()
        };
        let pipeline = spawn_scripted(events, config, sink.clone());

        let view = pipeline.view();
        wait_for("record applied", || view.read().unwrap().len() == 1).await;
        wait_for("closed", || {
            sink.notices().iter().any(|n| matches!(n, Notice::Closed))
        })
        .await;

        assert!(
            !sink.notices().iter().any(|n| matches!(n, Notice::BufferingAgain)),
            "no buffering episode for a stream that never backs up"
        );

        pipeline.join().await.unwrap();
    }

    #[tokio::test]
    async fn stale_handback_is_cleared_by_the_handoff() {
        let s = session();
        let sink = RecordingSink::default();
        let (tx, rx) = mpsc::channel(16);
        let pipeline = Pipeline::spawn(fast_config(), rx, sink.clone());

        tx.send(SourceEvent::Record(Record::text(1, ts(10), s, 1, "buffered")))
            .await
            .unwrap();
        // A request raised while the producer is still buffering points at
        // backlog the coming handoff replaces wholesale.
        pipeline.handback.request();
        tx.send(SourceEvent::CaughtUp).await.unwrap();

        wait_for("initial load", || {
            sink.notices()
                .iter()
                .any(|n| matches!(n, Notice::InitialLoadComplete { records: 1 }))
        })
        .await;

        let view = pipeline.view();
        tx.send(SourceEvent::Record(Record::text(2, ts(20), s, 1, "live")))
            .await
            .unwrap();
        wait_for("live insert", || view.read().unwrap().len() == 2).await;

        assert!(
            !sink.notices().iter().any(|n| matches!(n, Notice::BufferingAgain)),
            "stale request must not trigger a buffering episode after the handoff"
        );

        drop(tx);
        pipeline.join().await.unwrap();
    }
}
