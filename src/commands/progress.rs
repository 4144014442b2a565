// src/commands/progress.rs
//! Terminal progress for conversions and moves
//!
//! Adapts library progress events to an indicatif bar: stage changes become
//! the bar message, byte counts move the bar and fill in the size column.
//! With `--log-progress` the bar is hidden and events go to the log instead.

use discshelf::progress::{LogProgress, ProgressEvent, ProgressSink};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Bar resolution; one step is a tenth of a percent
const BAR_STEPS: u64 = 1000;

/// How a command shows progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Bar,
    Log,
    Quiet,
}

/// Progress bar for a single long-running operation
pub struct TransferProgress {
    bar: ProgressBar,
    log: Option<LogProgress>,
}

impl TransferProgress {
    /// Create a bar labelled with `operation`
    pub fn new(operation: &str, mode: ProgressMode) -> Self {
        let bar = if mode != ProgressMode::Bar {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(BAR_STEPS)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.green/dim}] {prefix}")
                .expect("Invalid progress bar template")
                .progress_chars("##-"),
        );
        bar.set_message(operation.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        let log = (mode == ProgressMode::Log).then(|| LogProgress::new(operation));
        Self { bar, log }
    }

    fn set_percent(&self, percent: f64) {
        let steps = (percent * 10.0).round().clamp(0.0, BAR_STEPS as f64) as u64;
        self.bar.set_position(steps);
    }

    /// Finish with a success message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Leave the bar where it stopped with a failure message
    pub fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

impl ProgressSink for TransferProgress {
    fn emit(&self, event: ProgressEvent) {
        if let Some(log) = &self.log {
            log.emit(event.clone());
        }
        match event {
            ProgressEvent::Stage(stage) => self.bar.set_message(stage.to_string()),
            ProgressEvent::Conversion(p) => {
                self.set_percent(p.percent);
                self.bar
                    .set_prefix(format!("{:.2}/{:.2} MB", p.written_mb, p.total_mb));
            }
            ProgressEvent::Copy(p) => {
                self.set_percent(p.percent);
                self.bar.set_prefix(format!(
                    "{:.2}/{:.2} MB, {:.0}s",
                    p.copied_mb, p.total_mb, p.elapsed
                ));
            }
        }
    }

    fn wants_progress(&self) -> bool {
        self.log.is_some() || !self.bar.is_hidden()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discshelf::progress::{CopyProgress, Stage};

    #[test]
    fn test_modes_control_numeric_progress() {
        assert!(!TransferProgress::new("Moving", ProgressMode::Quiet).wants_progress());
        assert!(TransferProgress::new("Moving", ProgressMode::Log).wants_progress());
    }

    #[test]
    fn test_log_mode_accepts_events() {
        let progress = TransferProgress::new("Moving", ProgressMode::Log);
        progress.emit(ProgressEvent::Stage(Stage::Importing));
        progress.emit(ProgressEvent::Copy(CopyProgress::new(512, 1024, 0.4)));
        assert_eq!(progress.bar.position(), 500);
    }
}
