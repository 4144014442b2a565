// src/library.rs

//! Library maintenance
//!
//! A library root holds images in `CD`, `DVD` and `POPS`, cover art in `ART`
//! and the app registry at its top level. This module lists, renames and
//! deletes games together with everything that belongs to them, and fills
//! `ART` from the art database.

use crate::artdb::{self, ART_KINDS, ArtFetcher};
use crate::companion::{self, POPS_DIR};
use crate::error::{Error, Result};
use crate::family::DiscFamily;
use crate::relocate::Moved;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// Image directories, in listing order
pub const GAME_DIRS: [&str; 3] = ["CD", "DVD", POPS_DIR];

/// Extensions recognised as game images
pub const GAME_EXTENSIONS: [&str; 3] = ["iso", "zso", "vcd"];

/// Cover art directory
pub const ART_DIR: &str = "ART";

/// Extensions recognised as artwork
pub const ART_EXTENSIONS: [&str; 2] = ["png", "jpg"];

/// An image in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFile {
    /// File name without extension
    pub name: String,
    /// Extension including the dot, as found on disk
    pub extension: String,
    pub parent_path: PathBuf,
    pub path: PathBuf,
    pub size: u64,
    /// Modification time in seconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
}

impl GameFile {
    /// Whether the image lives in `POPS` or is a `.vcd`
    pub fn is_pops(&self) -> bool {
        is_pops_image(&self.path)
    }
}

/// A piece of cover art
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    pub name: String,
    pub extension: String,
    pub path: PathBuf,
    /// `SLUS_203.12` for `SLUS_203.12_COV.png`
    pub game_id: String,
    /// `COV` for `SLUS_203.12_COV.png`
    #[serde(rename = "type")]
    pub kind: String,
    pub base64: String,
}

/// One failed removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionError {
    pub path: PathBuf,
    pub message: String,
}

/// Per-target result of [`delete_game`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub success: bool,
    pub removed: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub errors: Vec<DeletionError>,
}

impl DeletionReport {
    async fn remove(&mut self, path: PathBuf) {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => self.removed.push(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.missing.push(path),
            Err(e) => self.fail(path, e.to_string()),
        }
    }

    fn fail(&mut self, path: PathBuf, message: String) {
        warn!("Failed to remove {}: {}", path.display(), message);
        self.errors.push(DeletionError { path, message });
    }

    fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        self
    }
}

/// Outcome of fetching one art type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtDownload {
    /// Game id the art belongs to
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-type result of [`download_artwork`]
///
/// `success` reports that the run completed; individual failures are in
/// the entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtDownloadReport {
    pub success: bool,
    pub data: Vec<ArtDownload>,
}

impl ArtDownloadReport {
    pub fn saved(&self) -> impl Iterator<Item = &ArtDownload> {
        self.data.iter().filter(|d| d.saved_path.is_some())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtDownload> {
        self.data.iter().filter(|d| d.error.is_some())
    }
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| allowed.contains(&e.as_str()))
}

fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether an image is a POPS title
pub fn is_pops_image(path: &Path) -> bool {
    let in_pops = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|dir| dir.to_string_lossy().to_ascii_uppercase().ends_with(POPS_DIR));
    in_pops || has_extension(path, &["vcd"])
}

/// Regular, non-hidden files in `dir` matching `allowed`, sorted by name
async fn matching_files(dir: &Path, allowed: &[&str]) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::IoError(format!("Failed to read {}: {e}", dir.display())));
        }
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !has_extension(&path, allowed) || !entry.file_type().await?.is_file() {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Images under `CD`, `DVD` and `POPS`
pub async fn list_games(root: &Path) -> Result<Vec<GameFile>> {
    let mut games = Vec::new();
    for dir in GAME_DIRS {
        let parent = root.join(dir);
        for path in matching_files(&parent, &GAME_EXTENSIONS).await? {
            let meta = tokio::fs::metadata(&path).await?;
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs());
            games.push(GameFile {
                name: stem(&path),
                extension: dotted_extension(&path),
                parent_path: parent.clone(),
                path,
                size: meta.len(),
                modified,
            });
        }
    }
    debug!("Found {} games under {}", games.len(), root.display());
    Ok(games)
}

/// Split an art file name into game id and art type
pub fn parse_art_name(file_name: &str) -> (String, String) {
    let parts: Vec<&str> = file_name.split('_').collect();
    let game_id = match parts.as_slice() {
        [first, second, ..] => format!("{first}_{second}"),
        _ => stem(Path::new(file_name)),
    };
    let kind = parts
        .get(2)
        .and_then(|part| part.split('.').next())
        .unwrap_or_default()
        .to_string();
    (game_id, kind)
}

/// Cover art under `ART`, with contents encoded as base64
pub async fn list_artwork(root: &Path) -> Result<Vec<Artwork>> {
    let mut art = Vec::new();
    for path in matching_files(&root.join(ART_DIR), &ART_EXTENSIONS).await? {
        let bytes = tokio::fs::read(&path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (game_id, kind) = parse_art_name(&file_name);
        art.push(Artwork {
            name: stem(&path),
            extension: dotted_extension(&path),
            game_id,
            kind,
            base64: STANDARD.encode(bytes),
            path,
        });
    }
    Ok(art)
}

/// Rename an image to `<game_id>.<game_name><ext>` in place
pub async fn rename_game_file(path: &Path, game_id: &str, game_name: &str) -> Result<Moved> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let new_path = parent.join(format!("{game_id}.{game_name}{}", dotted_extension(path)));

    tokio::fs::rename(path, &new_path).await.map_err(|e| {
        Error::IoError(format!("Failed to rename {}: {e}", path.display()))
    })?;
    info!("Renamed {} -> {}", path.display(), new_path.display());
    Ok(Moved { new_path })
}

/// Delete an image and everything tied to it
///
/// Removes the image, every `ART` file starting with `<game_id>_`
/// (case-insensitive) and, for POPS titles, the launcher stub and its
/// registry line. Targets that are already gone are reported as missing;
/// the report succeeds only when nothing failed.
pub async fn delete_game(root: &Path, game_id: &str, image: &Path) -> DeletionReport {
    let mut report = DeletionReport::default();
    report.remove(image.to_path_buf()).await;

    let art_dir = root.join(ART_DIR);
    let prefix = format!("{}_", game_id.to_uppercase());
    match art_files(&art_dir).await {
        Ok(files) => {
            for path in files {
                let matches = path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().to_uppercase().starts_with(&prefix));
                if matches {
                    report.remove(path).await;
                }
            }
        }
        Err(e) => report.fail(art_dir, e.to_string()),
    }

    if is_pops_image(image) {
        let elf_name = companion::launcher_name_for(image);
        report.remove(root.join(POPS_DIR).join(&elf_name)).await;
        if let Err(e) = companion::remove_registry_entry(root, &elf_name).await {
            report.fail(root.join(companion::REGISTRY_FILE), e.to_string());
        }
    }

    let report = report.finish();
    info!(
        "Deleted {}: {} removed, {} missing, {} errors",
        game_id,
        report.removed.len(),
        report.missing.len(),
        report.errors.len()
    );
    report
}

/// Fetch cover, icon and screenshot for a game into `art_dir`
///
/// Each type is fetched and saved independently as `<game_id>_<TYPE>.png`;
/// a failed type is recorded in the report and the others still run.
pub async fn download_artwork(
    fetcher: &dyn ArtFetcher,
    art_dir: &Path,
    game_id: &str,
    family: DiscFamily,
) -> ArtDownloadReport {
    let mut report = ArtDownloadReport {
        success: true,
        data: Vec::with_capacity(ART_KINDS.len()),
    };

    for kind in ART_KINDS {
        let url = artdb::art_url(fetcher.base_url(), family, game_id, kind);
        let target = art_dir.join(artdb::art_file_name(game_id, kind));

        let result = match fetcher.fetch(&url).await {
            Ok(bytes) => save_art(&target, &bytes).await,
            Err(e) => Err(e),
        };

        let (saved_path, error) = match result {
            Ok(()) => {
                debug!("Saved {}", target.display());
                (Some(target), None)
            }
            Err(e) => {
                warn!("Art {} for {} unavailable: {}", kind, game_id, e);
                (None, Some(e.to_string()))
            }
        };
        report.data.push(ArtDownload {
            name: game_id.to_string(),
            kind: kind.to_string(),
            url,
            saved_path,
            error,
        });
    }

    info!(
        "Downloaded {} of {} art files for {}",
        report.saved().count(),
        ART_KINDS.len(),
        game_id
    );
    report
}

async fn save_art(target: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }
    tokio::fs::write(target, bytes).await.map_err(|e| {
        Error::IoError(format!("Failed to write {}: {e}", target.display()))
    })
}

/// Every regular file in `dir`
async fn art_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
