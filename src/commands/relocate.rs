// src/commands/relocate.rs

//! Image move command

use super::{Context, report};
use anyhow::Result;
use discshelf::relocate;
use std::path::Path;

/// Move an image, copying across volumes with a progress bar
pub async fn cmd_move(ctx: &Context, source: &Path, destination: &Path) -> Result<()> {
    let progress = ctx.progress("Moving");
    let outcome = relocate::relocate(source, destination, &progress).await;
    match &outcome.message {
        None => progress.finish("Moved"),
        Some(message) => progress.finish_with_error(message),
    }

    report(ctx, outcome, |moved| {
        println!("Moved to {}", moved.new_path.display());
    })
}
