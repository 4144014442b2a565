// src/commands/scan.rs

//! Game identification command

use super::{Context, report};
use anyhow::Result;
use discshelf::catalog::global_catalog;
use std::path::Path;
use tracing::info;

/// Identify the game in an image or sheet
pub async fn cmd_scan(ctx: &Context, path: &Path) -> Result<()> {
    info!("Scanning {}", path.display());
    let catalog = global_catalog(&ctx.settings);
    let outcome = discshelf::identify(path, catalog).await;

    report(ctx, outcome, |identity| {
        println!("Game ID:  {}", identity.game_id);
        println!("Code:     {}", identity.formatted_game_id);
        println!("Family:   {}", identity.family);
        match &identity.game_name {
            Some(name) => println!("Title:    {}", name),
            None => println!("Title:    (not in catalog)"),
        }
    })
}
