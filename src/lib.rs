// src/lib.rs

//! Discshelf
//!
//! Backend for a PS2/PS1 game library laid out for Open PS2 Loader: identify
//! disc images by the product code burned into them, turn CUE/BIN dumps into
//! POPS `.vcd` images, and move images into the library with progress.
//!
//! # Architecture
//!
//! - Scanning: raw byte search for product codes, looked up in per-family
//!   title catalogs loaded once per process
//! - Conversion: multi-track sheets are merged with `binmerge`, then handed
//!   to `cue2pops` or a configured converter command; external tools run
//!   behind [`exec::CommandRunner`]
//! - Relocation: rename, falling back to a streamed copy across volumes
//! - Companions: launcher stubs and `conf_apps.cfg` entries for POPS titles
//! - Library: listing, renaming and deleting games, and downloading cover
//!   art from the art database over HTTP
//!
//! Public operations return an [`Outcome`] instead of failing; progress and
//! stage changes go to a [`ProgressSink`].

pub mod artdb;
pub mod catalog;
pub mod companion;
pub mod config;
pub mod convert;
pub mod discovery;
mod error;
pub mod exec;
pub mod family;
pub mod library;
pub mod merge;
pub mod progress;
pub mod relocate;
pub mod scanner;
pub mod sheet;

pub use artdb::{ArtFetcher, HttpArtFetcher};
pub use catalog::{CatalogLookup, FileCatalog, StaticCatalog};
pub use config::Settings;
pub use convert::{Converted, convert};
pub use error::{Error, Outcome, Result};
pub use exec::{CommandRunner, CommandSpec, SystemRunner};
pub use family::DiscFamily;
pub use library::{
    ArtDownloadReport, DeletionReport, GameFile, delete_game, download_artwork, list_artwork,
    list_games,
};
pub use progress::{
    CallbackProgress, ChannelProgress, LogProgress, ProgressEvent, ProgressSink, SilentProgress,
    Stage,
};
pub use relocate::{Moved, move_file};
pub use scanner::{GameIdentity, identify, scan_file};
