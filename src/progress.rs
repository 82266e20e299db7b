//! Ingest progress reporting.
//!
//! Reports what `docscan ingest` is doing so users see which file is being
//! analyzed and how many are left. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use anyhow::bail;
use std::io::Write;
use std::str::FromStr;

/// A single progress event for ingestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestEvent {
    /// Walking the input paths; total unknown.
    Discovering { paths: usize },
    /// File `n` of `total` is being parsed and analyzed.
    Analyzing {
        n: u64,
        total: u64,
        filename: String,
    },
    /// The batch finished.
    Done { analyzed: u64, failed: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: IngestEvent);
}

/// Human-friendly progress on stderr: "analyzing  3 / 1,200  decks/acme.html".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Discovering { paths } => {
                format!("ingest  discovering {} path(s)...\n", paths)
            }
            IngestEvent::Analyzing { n, total, filename } => format!(
                "ingest  analyzing  {} / {}  {}\n",
                format_number(*n),
                format_number(*total),
                filename
            ),
            IngestEvent::Done { analyzed, failed } => format!(
                "ingest  done  {} analyzed, {} failed\n",
                format_number(*analyzed),
                format_number(*failed)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: IngestEvent) {
        let obj = match &event {
            IngestEvent::Discovering { paths } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "paths": paths
            }),
            IngestEvent::Analyzing { n, total, filename } => serde_json::json!({
                "event": "progress",
                "phase": "analyzing",
                "n": n,
                "total": total,
                "filename": filename
            }),
            IngestEvent::Done { analyzed, failed } => serde_json::json!({
                "event": "done",
                "analyzed": analyzed,
                "failed": failed
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

fn format_number(n: u64) -> String {
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
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
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

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = anyhow::Error;

    /// `auto` resolves against the current stderr.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "auto" => ProgressMode::default_for_tty(),
            "human" => ProgressMode::Human,
            "json" => ProgressMode::Json,
            "off" | "none" => ProgressMode::Off,
            other => bail!("Unknown progress mode: '{}'. Use auto, human, json or off.", other),
        })
    }
}
