// src/commands/library.rs

//! Library listing and maintenance commands

use super::{Context, report};
use anyhow::{Context as _, Result, bail};
use discshelf::{DiscFamily, HttpArtFetcher, Outcome, library};
use std::path::Path;

/// List images under CD, DVD and POPS
pub async fn cmd_list(ctx: &Context, root: &Path) -> Result<()> {
    let outcome: Outcome<_> = library::list_games(root).await.map(|games| Listing { games }).into();

    report(ctx, outcome, |listing| {
        if listing.games.is_empty() {
            println!("No games found under {}", root.display());
            return;
        }
        for game in &listing.games {
            let kind = if game.is_pops() { "POPS" } else { "ISO" };
            println!(
                "{:<4} {:>10.1} MB  {}{}",
                kind,
                game.size as f64 / (1024.0 * 1024.0),
                game.name,
                game.extension
            );
        }
        println!("{} game(s)", listing.games.len());
    })
}

#[derive(serde::Serialize)]
struct Listing {
    #[serde(rename = "data")]
    games: Vec<library::GameFile>,
}

#[derive(serde::Serialize)]
struct ArtListing {
    #[serde(rename = "data")]
    art: Vec<library::Artwork>,
}

/// List cover art under ART
pub async fn cmd_art(ctx: &Context, root: &Path) -> Result<()> {
    let outcome: Outcome<_> = library::list_artwork(root).await.map(|art| ArtListing { art }).into();

    report(ctx, outcome, |listing| {
        for art in &listing.art {
            println!("{:<14} {:<4} {}", art.game_id, art.kind, art.path.display());
        }
        println!("{} file(s)", listing.art.len());
    })
}

/// Download art for a game into ART
///
/// Missing art types are reported but do not fail the command.
pub async fn cmd_fetch_art(ctx: &Context, root: &Path, game_id: &str, ps1: bool) -> Result<()> {
    let family = if ps1 { DiscFamily::Ps1 } else { DiscFamily::Ps2 };
    let fetcher = HttpArtFetcher::from_settings(&ctx.settings).context("Failed to set up art downloads")?;
    let art_dir = root.join(library::ART_DIR);
    let downloads = library::download_artwork(&fetcher, &art_dir, game_id, family).await;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&downloads)?);
        return Ok(());
    }

    for download in &downloads.data {
        match (&download.saved_path, &download.error) {
            (Some(path), _) => println!("{:<4} saved {}", download.kind, path.display()),
            (None, Some(error)) => println!("{:<4} {}", download.kind, error),
            (None, None) => {}
        }
    }
    println!("{} of {} art file(s) downloaded", downloads.saved().count(), downloads.data.len());
    Ok(())
}

/// Rename an image to `<game_id>.<game_name><ext>`
pub async fn cmd_rename(ctx: &Context, path: &Path, game_id: &str, game_name: &str) -> Result<()> {
    let outcome: Outcome<_> = library::rename_game_file(path, game_id, game_name).await.into();
    report(ctx, outcome, |moved| {
        println!("Renamed to {}", moved.new_path.display());
    })
}

/// Delete an image and its related files
pub async fn cmd_delete(ctx: &Context, root: &Path, game_id: &str, path: &Path) -> Result<()> {
    let deletion = library::delete_game(root, game_id, path).await;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&deletion)?);
    } else {
        for removed in &deletion.removed {
            println!("Removed {}", removed.display());
        }
        for missing in &deletion.missing {
            println!("Already gone {}", missing.display());
        }
        for error in &deletion.errors {
            eprintln!("Failed {}: {}", error.path.display(), error.message);
        }
    }

    if !deletion.success {
        bail!("{} file(s) could not be removed", deletion.errors.len());
    }
    Ok(())
}
