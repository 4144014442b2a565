// src/main.rs

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, CompanionCommands};
use discshelf::Settings;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().or_else(Settings::default_path);
    let settings = Settings::load(config_path.as_deref()).with_context(|| {
        format!(
            "Failed to load settings from {}",
            config_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "defaults".to_string())
        )
    })?;
    debug!("Settings: {:?}", settings);

    let ctx = commands::Context {
        settings,
        json: cli.json,
        log_progress: cli.log_progress,
    };

    match cli.command {
        Commands::Scan { path } => commands::cmd_scan(&ctx, &path).await,
        Commands::Convert {
            cue,
            output,
            root,
            name,
        } => commands::cmd_convert(&ctx, &cue, &output, root.as_deref(), name.as_deref()).await,
        Commands::Move {
            source,
            destination,
        } => commands::cmd_move(&ctx, &source, &destination).await,
        Commands::List { root } => commands::cmd_list(&ctx, &root).await,
        Commands::Art { root } => commands::cmd_art(&ctx, &root).await,
        Commands::FetchArt { root, game_id, ps1 } => {
            commands::cmd_fetch_art(&ctx, &root, &game_id, ps1).await
        }
        Commands::Rename {
            path,
            game_id,
            game_name,
        } => commands::cmd_rename(&ctx, &path, &game_id, &game_name).await,
        Commands::Delete {
            root,
            game_id,
            path,
        } => commands::cmd_delete(&ctx, &root, &game_id, &path).await,
        Commands::Companion(CompanionCommands::Add { root, image, name }) => {
            commands::cmd_companion_add(&ctx, &root, &image, name.as_deref()).await
        }
        Commands::Companion(CompanionCommands::Remove { root, image }) => {
            commands::cmd_companion_remove(&ctx, &root, &image).await
        }
        Commands::Doctor => commands::cmd_doctor(&ctx).await,
    }
}
