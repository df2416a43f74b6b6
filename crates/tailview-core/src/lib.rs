//! tailview-core: Core library for tailview
//!
//! This crate merges a set of live, rotating structured log files into one
//! continuously ordered view with nesting, session context and duplicate
//! suppression resolved, adapting between bulk buffering and record-at-a-time
//! dispatch depending on how fast the consuming side keeps up.
//!
//! # Architecture
//!
//! ```text
//! JSONL log set → Source task → Producer ──(bounded dispatch)──▶ Consumer
//!                                  │                                │
//!                          private buffer                    SharedView +
//!                          (catch-up mode)                   ViewSink hooks
//! ```
//!
//! # Modules
//!
//! - `record`: the log record model (sessions, counters, scope markers)
//! - `order`: wraparound-aware canonical ordering and sorted insertion
//! - `view`: the shared ordered record view
//! - `dedup`: repeated-scope-marker suppression
//! - `indent`: batch and incremental indent/context resolution
//! - `source`: source event stream abstraction
//! - `jsonl`: JSONL wire codec and rotating-file follower
//! - `pipeline`: the adaptive producer/consumer merge pipeline
//! - `config`: configuration management
//! - `logging`: tracing-based logging setup
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod config;
pub mod dedup;
pub mod error;
pub mod indent;
pub mod jsonl;
pub mod logging;
pub mod order;
pub mod pipeline;
pub mod record;
pub mod source;
pub mod view;

pub use error::{Error, Result};
