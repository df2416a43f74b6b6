//! Record sources feeding the merge pipeline.
//!
//! A source is a task that pushes [`SourceEvent`]s into a bounded channel:
//! records as they are read, a [`SourceEvent::CaughtUp`] marker whenever all
//! currently available data has been drained, recoverable read failures as
//! [`SourceEvent::Error`], and a final [`SourceEvent::Eof`] when the source
//! ends for good. The pipeline owns the receiving end; a shared shutdown
//! flag stops the source task cooperatively.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::error::SourceError;
use crate::record::Record;

/// One step of a source's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A decoded log record
    Record(Record),
    /// Everything currently readable has been delivered; more may follow
    CaughtUp,
    /// A recoverable read or decode failure, reported in-stream
    Error(SourceError),
    /// The source is finished and will deliver nothing further
    Eof,
}

/// A source that replays a fixed script of events, then signals EOF.
///
/// Used by tests and demos to drive the pipeline deterministically.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    events: Vec<SourceEvent>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(events: Vec<SourceEvent>) -> Self {
        Self { events }
    }

    /// Push the scripted events, then `Eof`. Returns early if the shutdown
    /// flag is raised or the receiver is dropped.
    pub async fn run(self, event_tx: mpsc::Sender<SourceEvent>, shutdown: Arc<AtomicBool>) {
        for event in self.events {
            if shutdown.load(Ordering::SeqCst) {
                return;
            }
            if event_tx.send(event).await.is_err() {
                return;
            }
        }
        let _ = event_tx.send(SourceEvent::Eof).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, SessionId};
    use chrono::DateTime;

    fn rec(counter: i32) -> Record {
        let session = SessionId(uuid::Uuid::from_u128(1));
        let time = DateTime::from_timestamp(i64::from(counter), 0).expect("valid timestamp");
        Record::text(counter, time, session, 1, format!("line {counter}"))
    }

    #[tokio::test]
    async fn scripted_source_replays_in_order_then_eof() {
        let source = ScriptedSource::new(vec![
            SourceEvent::Record(rec(1)),
            SourceEvent::Record(rec(2)),
            SourceEvent::CaughtUp,
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = Arc::new(AtomicBool::new(false));

        source.run(tx, shutdown).await;

        assert_eq!(rx.recv().await, Some(SourceEvent::Record(rec(1))));
        assert_eq!(rx.recv().await, Some(SourceEvent::Record(rec(2))));
        assert_eq!(rx.recv().await, Some(SourceEvent::CaughtUp));
        assert_eq!(rx.recv().await, Some(SourceEvent::Eof));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn shutdown_flag_stops_scripted_source() {
        let source = ScriptedSource::new(vec![
            SourceEvent::Record(rec(1)),
            SourceEvent::Record(rec(2)),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = Arc::new(AtomicBool::new(true));

        source.run(tx, shutdown).await;

        // Raised before the first send: nothing delivered, not even Eof.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_receiver_ends_source() {
        let source = ScriptedSource::new(vec![SourceEvent::Record(rec(1))]);
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let shutdown = Arc::new(AtomicBool::new(false));
        // Must return instead of hanging.
        source.run(tx, shutdown).await;
    }
}
