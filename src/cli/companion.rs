// src/cli/companion.rs
//! Launcher stub and registry commands

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum CompanionCommands {
    /// Create the launcher stub and registry entry for a POPS image
    Add {
        /// Library root
        root: PathBuf,

        /// POPS image (.vcd)
        image: PathBuf,

        /// Display name for the registry entry
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove the launcher stub and registry entry for a POPS image
    Remove {
        /// Library root
        root: PathBuf,

        /// POPS image (.vcd)
        image: PathBuf,
    },
}
