// src/commands/mod.rs
//! Command handlers for the discshelf CLI

mod companion;
mod convert;
mod doctor;
mod library;
pub mod progress;
mod relocate;
mod scan;

pub use companion::{cmd_companion_add, cmd_companion_remove};
pub use convert::cmd_convert;
pub use doctor::cmd_doctor;
pub use library::{cmd_art, cmd_delete, cmd_fetch_art, cmd_list, cmd_rename};
pub use relocate::cmd_move;
pub use scan::cmd_scan;

use anyhow::{Result, bail};
use discshelf::{Outcome, Settings};
use progress::{ProgressMode, TransferProgress};
use serde::Serialize;

/// State shared by every command
pub struct Context {
    pub settings: Settings,
    /// Print JSON instead of human-readable output
    pub json: bool,
    /// Report progress through the log instead of a bar
    pub log_progress: bool,
}

impl Context {
    /// Progress display for a long-running operation
    ///
    /// JSON output keeps stdout clean, so the bar is hidden unless progress
    /// goes to the log.
    pub fn progress(&self, operation: &str) -> TransferProgress {
        let mode = if self.log_progress {
            ProgressMode::Log
        } else if self.json {
            ProgressMode::Quiet
        } else {
            ProgressMode::Bar
        };
        TransferProgress::new(operation, mode)
    }
}

/// Print an outcome and turn a failure into an error
///
/// In JSON mode the whole outcome is printed; otherwise `print` renders the
/// value of a successful outcome.
pub(crate) fn report<T, F>(ctx: &Context, outcome: Outcome<T>, print: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    match outcome.into_result() {
        Ok(value) => {
            if !ctx.json {
                print(&value);
            }
            Ok(())
        }
        Err(message) => bail!(message),
    }
}
