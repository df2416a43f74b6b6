//! tailview: merge live structured log sets into one ordered stream.

#![forbid(unsafe_code)]

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::Context as _;
use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};

use tailview_core::config::Config;
use tailview_core::jsonl::JsonlLogSet;
use tailview_core::logging::init_logging;
use tailview_core::pipeline::{Notice, Pipeline, ViewSink};
use tailview_core::record::{Record, RecordKind, ScopeKind};

#[derive(Parser)]
#[command(
    name = "tailview",
    version,
    about = "Merge live, rotating structured log files into one ordered stream"
)]
struct Cli {
    /// Path to tailview.toml (defaults to ./tailview.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow a log set and print the merged, resolved stream
    Follow {
        /// A set prefix (`/logs/app`) or any member path (`/logs/app-3.jsonl`)
        path: PathBuf,

        /// Read what is on disk now, then exit instead of following
        #[arg(long)]
        no_follow: bool,

        /// Print resolved records as JSON lines instead of formatted text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref()).context("loading config")?;
    init_logging(&config.log).context("initializing logging")?;

    match cli.command {
        Command::Follow {
            path,
            no_follow,
            json,
        } => follow(&config, path, !no_follow, json).await,
    }
}

async fn follow(config: &Config, path: PathBuf, follow: bool, json: bool) -> anyhow::Result<()> {
    let set = JsonlLogSet::for_path(&path, follow, config.follow.clone());
    info!(prefix = %set.prefix().display(), follow, "following log set");

    let (source_tx, source_rx) = mpsc::channel(64);
    let pipeline = Pipeline::spawn(config.pipeline.clone(), source_rx, PrintSink { json });
    let source = tokio::spawn(set.run(source_tx, pipeline.shutdown_flag()));

    let shutdown = pipeline.shutdown_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    pipeline.join().await.context("pipeline failed")?;
    source.await.context("source task failed")?;
    Ok(())
}

/// Prints resolved records to stdout; notices go to the log on stderr.
struct PrintSink {
    json: bool,
}

impl PrintSink {
    fn print(&self, record: &Record) {
        let mut out = std::io::stdout().lock();
        let result = if self.json {
            serde_json::to_string(record)
                .map_err(std::io::Error::other)
                .and_then(|line| writeln!(out, "{line}"))
        } else {
            writeln!(out, "{}", render(record))
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to write record to stdout");
        }
    }
}

impl ViewSink for PrintSink {
    fn insert_one(&mut self, _index: usize, record: &Record) {
        self.print(record);
    }

    fn replace_all(&mut self, records: &[Record]) {
        for record in records {
            self.print(record);
        }
    }

    fn notice(&mut self, notice: Notice) {
        match notice {
            Notice::InitialLoadComplete { records } => {
                info!(records, "initial load complete");
            }
            Notice::BufferingAgain => info!("consumer busy, buffering again"),
            Notice::Progress { buffered } => info!(buffered, "buffering"),
            Notice::BufferingComplete { records } => {
                info!(records, "buffering complete, view replaced");
            }
            Notice::SourceError { error } => warn!(%error, "source error"),
            Notice::Closed => info!("stream closed"),
        }
    }
}

/// One formatted line: session-local time, priority, session, thread,
/// indentation, payload.
fn render(record: &Record) -> String {
    let offset = FixedOffset::east_opt(record.utc_offset.saturating_mul(60))
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    let local = record.time.with_timezone(&offset);
    let depth = usize::try_from(record.indent_level.max(0)).unwrap_or(0);
    let indent = "  ".repeat(depth);
    let body = match &record.kind {
        RecordKind::Text { text, details } => match details {
            Some(details) if !details.starts_with('\u{1}') => format!("{text} ({details})"),
            _ => text.clone(),
        },
        RecordKind::Data { name, value } => format!("{name} = {value}"),
        RecordKind::Scope(payload) => match payload.kind {
            ScopeKind::Enter => format!("> {}", payload.name),
            ScopeKind::Exit => format!("< {}", payload.name),
            ScopeKind::LogStart => "== session start ==".to_string(),
        },
    };
    let session = record.session.to_string();
    let session_short = session.get(..8).unwrap_or(&session);
    format!(
        "{} [{:<10}] {session_short} t{:02} {}{}",
        local.format("%Y-%m-%d %H:%M:%S%.3f %:z"),
        record.priority.as_str(),
        record.thread_id,
        indent,
        body
    )
}
