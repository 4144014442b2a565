// src/commands/convert.rs

//! CUE/BIN to POPS conversion command

use super::{Context, cmd_companion_add, report};
use anyhow::Result;
use discshelf::SystemRunner;
use std::path::Path;
use tracing::info;

/// Convert a sheet, then optionally register the result in a library
pub async fn cmd_convert(
    ctx: &Context,
    cue: &Path,
    output: &Path,
    root: Option<&Path>,
    name: Option<&str>,
) -> Result<()> {
    info!("Converting {} -> {}", cue.display(), output.display());

    let progress = ctx.progress("Converting");
    let outcome = discshelf::convert(cue, output, &ctx.settings, &SystemRunner, &progress).await;
    match &outcome.message {
        None => progress.finish("Converted"),
        Some(message) => progress.finish_with_error(message),
    }

    let converted = outcome.value.clone();
    report(ctx, outcome, |converted| {
        println!("Created {}", converted.new_path.display());
    })?;

    if let (Some(root), Some(converted)) = (root, converted) {
        cmd_companion_add(ctx, root, &converted.new_path, name).await?;
    }
    Ok(())
}
