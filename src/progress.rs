//! Upload progress reporting.
//!
//! Reports observable progress during `dq admin upload` so users see which
//! file is being sent, how many remain, and how each one went. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;
use std::str::FromStr;

/// A single progress event for an upload batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadProgressEvent {
    /// File `index` of `total` is being sent; `percent` of the batch is settled.
    Started {
        filename: String,
        index: usize,
        total: usize,
        percent: u8,
    },
    /// File `index` of `total` settled.
    Settled {
        filename: String,
        index: usize,
        total: usize,
        ok: bool,
    },
    /// Every file settled.
    Finished {
        total: usize,
        succeeded: usize,
        failed: usize,
    },
}

/// Reports upload progress. Implementations write to stderr (human or JSON).
pub trait UploadProgressReporter: Send + Sync {
    fn report(&self, event: &UploadProgressEvent);
}

/// Human-friendly progress on stderr: "upload (2/5)  40%  report.pdf".
pub struct StderrProgress;

impl UploadProgressReporter for StderrProgress {
    fn report(&self, event: &UploadProgressEvent) {
        let line = match event {
            UploadProgressEvent::Started {
                filename,
                index,
                total,
                percent,
            } => format!(
                "upload ({}/{})  {}  {:>3}%  {}\n",
                index,
                total,
                progress_bar(*percent),
                percent,
                filename
            ),
            UploadProgressEvent::Settled {
                filename, ok, ..
            } => format!("  {} {}\n", if *ok { "ok    " } else { "FAILED" }, filename),
            UploadProgressEvent::Finished {
                total,
                succeeded,
                failed,
            } => format!(
                "upload done  {}  100%  {} of {} uploaded, {} failed\n",
                progress_bar(100),
                succeeded,
                total,
                failed
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl UploadProgressReporter for JsonProgress {
    fn report(&self, event: &UploadProgressEvent) {
        let obj = match event {
            UploadProgressEvent::Started {
                filename,
                index,
                total,
                percent,
            } => serde_json::json!({
                "event": "progress",
                "phase": "uploading",
                "filename": filename,
                "n": index,
                "total": total,
                "percent": percent
            }),
            UploadProgressEvent::Settled {
                filename,
                index,
                total,
                ok,
            } => serde_json::json!({
                "event": "progress",
                "phase": "settled",
                "filename": filename,
                "n": index,
                "total": total,
                "ok": ok
            }),
            UploadProgressEvent::Finished {
                total,
                succeeded,
                failed,
            } => serde_json::json!({
                "event": "done",
                "total": total,
                "succeeded": succeeded,
                "failed": failed
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

impl UploadProgressReporter for NoProgress {
    fn report(&self, _event: &UploadProgressEvent) {}
}

fn progress_bar(percent: u8) -> String {
    const WIDTH: usize = 20;
    let filled = (percent.min(100) as usize * WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(WIDTH - filled))
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

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn UploadProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    /// Parses `auto`, `off`, `human` or `json`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ProgressMode::default_for_tty()),
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "invalid progress mode '{}': expected auto, off, human or json",
                other
            )),
        }
    }
}
