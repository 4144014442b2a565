// src/progress.rs

//! Progress and stage notification
//!
//! Long operations report two kinds of events: numeric progress (bytes
//! written or copied) and discrete stage transitions. Both go to a
//! [`ProgressSink`]. Notifications are fire-and-forget: the core never waits
//! on a sink and a sink cannot influence the job.
//!
//! # Implementations
//!
//! - `SilentProgress`: no-op, also tells the job not to poll for progress
//! - `LogProgress`: writes events to tracing
//! - `CallbackProgress`: hands events to a closure
//! - `ChannelProgress`: forwards events over a tokio channel
//!
//! # Example
//!
//! ```ignore
//! use discshelf::progress::{CallbackProgress, ProgressEvent};
//!
//! let sink = CallbackProgress::new(|event| {
//!     if let ProgressEvent::Stage(stage) = event {
//!         println!("{stage}");
//!     }
//! });
//! ```

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Stage of a conversion job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Merging,
    Importing,
    Finalizing,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merging => write!(f, "Merging..."),
            Self::Importing => write!(f, "Importing..."),
            Self::Finalizing => write!(f, "Finalizing..."),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Output growth of a running conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionProgress {
    pub percent: f64,
    #[serde(rename = "writtenMB")]
    pub written_mb: f64,
    #[serde(rename = "totalMB")]
    pub total_mb: f64,
}

impl ConversionProgress {
    /// Progress for `written` of `total` bytes, capped below 100 while running
    pub fn sample(written: u64, total: u64) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            (written as f64 / total as f64 * 100.0).min(99.9)
        };
        Self {
            percent: round_to(percent, 1),
            written_mb: megabytes(written),
            total_mb: megabytes(total),
        }
    }

    /// Final report once the converter has finished
    pub fn complete(total: u64) -> Self {
        Self {
            percent: 100.0,
            written_mb: megabytes(total),
            total_mb: megabytes(total),
        }
    }
}

/// Bytes copied by a cross-volume move
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyProgress {
    pub percent: f64,
    #[serde(rename = "copiedMB")]
    pub copied_mb: f64,
    #[serde(rename = "totalMB")]
    pub total_mb: f64,
    /// Seconds since the copy started
    pub elapsed: f64,
}

impl CopyProgress {
    pub fn new(copied: u64, total: u64, elapsed_secs: f64) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            copied as f64 / total as f64 * 100.0
        };
        Self {
            percent: round_to(percent, 1),
            copied_mb: megabytes(copied),
            total_mb: megabytes(total),
            elapsed: round_to(elapsed_secs, 1),
        }
    }
}

/// Event delivered to a sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ProgressEvent {
    Stage(Stage),
    Conversion(ConversionProgress),
    Copy(CopyProgress),
}

/// Receiver of progress and stage events
pub trait ProgressSink: Send + Sync {
    /// Deliver an event; must not block
    fn emit(&self, event: ProgressEvent);

    /// Whether numeric progress is wanted
    ///
    /// Jobs skip output polling entirely when this is false. Stage events
    /// are always delivered.
    fn wants_progress(&self) -> bool {
        true
    }

    fn stage(&self, stage: Stage) {
        self.emit(ProgressEvent::Stage(stage));
    }
}

/// No-op sink
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _event: ProgressEvent) {}

    fn wants_progress(&self) -> bool {
        false
    }
}

/// Sink that logs events to tracing at info level
#[derive(Debug)]
pub struct LogProgress {
    name: String,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Stage(stage) => info!("{}: {}", self.name, stage),
            ProgressEvent::Conversion(p) => info!(
                "{}: {}% ({}/{} MB)",
                self.name, p.percent, p.written_mb, p.total_mb
            ),
            ProgressEvent::Copy(p) => info!(
                "{}: {}% ({}/{} MB) - {}s elapsed",
                self.name, p.percent, p.copied_mb, p.total_mb, p.elapsed
            ),
        }
    }
}

/// Sink that calls a closure for every event
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
    wants_progress: bool,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            wants_progress: true,
        }
    }

    /// Only deliver stage transitions
    pub fn stages_only(callback: F) -> Self {
        Self {
            callback,
            wants_progress: false,
        }
    }
}

impl<F> ProgressSink for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        if self.wants_progress || matches!(event, ProgressEvent::Stage(_)) {
            (self.callback)(event);
        }
    }

    fn wants_progress(&self) -> bool {
        self.wants_progress
    }
}

/// Sink that forwards events to an unbounded channel
///
/// Events are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    fn wants_progress(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Bytes as megabytes, rounded to two decimals
pub fn megabytes(bytes: u64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_MB, 2)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
