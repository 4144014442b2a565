// src/cli/mod.rs
//! CLI definitions for discshelf
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Image commands:
//! - `scan` - Identify the game in an image or sheet
//! - `convert` - Convert a CUE/BIN dump to a POPS image
//! - `move` - Move an image into the library
//!
//! Library commands:
//! - `list` / `art` - List images and cover art
//! - `fetch-art` - Download cover art from the art database
//! - `rename` / `delete` - Maintain individual games
//! - `companion` - Launcher stubs and registry entries
//! - `doctor` - Check external tools and catalogs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod companion;

pub use companion::CompanionCommands;

#[derive(Parser)]
#[command(name = "discshelf")]
#[command(author = "Discshelf Contributors")]
#[command(version)]
#[command(about = "PS2/PS1 disc image library manager", long_about = None)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log progress instead of drawing a progress bar
    #[arg(long, global = true)]
    pub log_progress: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the game in an image or CUE sheet
    Scan {
        /// Image (.iso, .bin, .vcd) or sheet (.cue)
        path: PathBuf,
    },

    /// Convert a CUE/BIN dump to a POPS .vcd image
    Convert {
        /// CUE sheet to convert
        cue: PathBuf,

        /// Output image path
        output: PathBuf,

        /// Library root; creates the launcher and registry entry afterwards
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Display name for the registry entry
        #[arg(long)]
        name: Option<String>,
    },

    /// Move an image, copying across volumes when needed
    Move {
        /// Image to move
        source: PathBuf,

        /// Destination file or directory
        destination: PathBuf,
    },

    /// List images under CD, DVD and POPS
    List {
        /// Library root
        root: PathBuf,
    },

    /// List cover art under ART
    Art {
        /// Library root
        root: PathBuf,
    },

    /// Download cover, icon and screenshot art into ART
    FetchArt {
        /// Library root
        root: PathBuf,

        /// Product code, e.g. SLUS_203.12
        game_id: String,

        /// Fetch from the PS1 art set instead of PS2
        #[arg(long)]
        ps1: bool,
    },

    /// Rename an image to <GAME_ID>.<NAME><ext>
    Rename {
        /// Image to rename
        path: PathBuf,

        /// Product code, e.g. SLUS_203.12
        game_id: String,

        /// Title
        game_name: String,
    },

    /// Delete an image with its art, launcher and registry entry
    Delete {
        /// Library root
        root: PathBuf,

        /// Product code used for the art files
        game_id: String,

        /// Image to delete
        path: PathBuf,
    },

    /// Launcher stub and registry management
    #[command(subcommand)]
    Companion(CompanionCommands),

    /// Check the converter, merge tool and title catalogs
    Doctor,
}
