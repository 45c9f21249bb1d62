//! Search progress reporting.
//!
//! Reports what a search is doing while the backend is queried, so a slow
//! API does not look like a hung terminal. Progress is emitted on **stderr**
//! so stdout remains parseable for scripts. Diagnostics go through
//! `tracing`; this module is only for user-facing status lines.

use std::io::Write;

use tc_search_core::models::{RecordKind, Scope};

/// A single progress event for a search.
#[derive(Clone, Debug)]
pub enum SearchProgressEvent {
    /// The request was built; backend calls are about to start.
    Started { scope: Scope, query: String, page: usize },
    /// One collection is being queried.
    Fetching { kind: RecordKind, tql: String },
    /// Results arrived and were grouped.
    Completed {
        records: u64,
        grouped: u64,
        total: u64,
        elapsed_ms: u128,
    },
    /// The search failed; the message is shown to the user elsewhere too.
    Failed { message: String },
}

/// Reports search progress. Implementations write to stderr (human or JSON).
pub trait SearchProgressReporter: Send + Sync {
    fn report(&self, event: SearchProgressEvent);
}

/// Human-friendly progress on stderr: "search done  12 records, 9 unique (1,204 total) in 310 ms".
pub struct StderrProgress;

impl SearchProgressReporter for StderrProgress {
    fn report(&self, event: SearchProgressEvent) {
        let line = match &event {
            SearchProgressEvent::Started { scope, query, page } => {
                format!("search {}  \"{}\"  page {}\n", scope, query, page + 1)
            }
            SearchProgressEvent::Fetching { kind, .. } => {
                format!("search {}  fetching...\n", kind.endpoint())
            }
            SearchProgressEvent::Completed {
                records,
                grouped,
                total,
                elapsed_ms,
            } => format!(
                "search done  {} records, {} unique ({} total) in {} ms\n",
                format_number(*records),
                format_number(*grouped),
                format_number(*total),
                elapsed_ms
            ),
            SearchProgressEvent::Failed { message } => format!("search failed  {}\n", message),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SearchProgressReporter for JsonProgress {
    fn report(&self, event: SearchProgressEvent) {
        let obj = match &event {
            SearchProgressEvent::Started { scope, query, page } => serde_json::json!({
                "event": "progress",
                "phase": "started",
                "scope": scope,
                "query": query,
                "page": page
            }),
            SearchProgressEvent::Fetching { kind, tql } => serde_json::json!({
                "event": "progress",
                "phase": "fetching",
                "kind": kind,
                "tql": tql
            }),
            SearchProgressEvent::Completed {
                records,
                grouped,
                total,
                elapsed_ms,
            } => serde_json::json!({
                "event": "progress",
                "phase": "completed",
                "records": records,
                "grouped": grouped,
                "total": total,
                "elapsed_ms": *elapsed_ms as u64
            }),
            SearchProgressEvent::Failed { message } => serde_json::json!({
                "event": "progress",
                "phase": "failed",
                "message": message
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SearchProgressReporter for NoProgress {
    fn report(&self, _event: SearchProgressEvent) {}
}

/// Format an integer with thousands separators.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn SearchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
