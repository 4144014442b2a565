// src/sheet.rs

//! CUE sheet parsing
//!
//! Only the parts of the sheet that matter for import are modelled: `FILE`
//! declarations (with their `TRACK` entries) in declaration order. Track
//! order is significant to the merge and conversion tools, so references are
//! never reordered.
//!
//! A reference line is `FILE "path" TYPE` or `FILE path TYPE`; the keyword is
//! case-insensitive and the quoted form wins when both would match. Paths are
//! resolved against the sheet's own directory.

use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static QUOTED_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)^FILE\s+"(.+?)"\s+(\w+)"#).expect("valid regex"));

static BARE_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^FILE\s+(.+?)\s+(\w+)").expect("valid regex"));

/// A parsed sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueSheet {
    /// Data files in declaration order
    pub files: Vec<CueFile>,
}

/// A `FILE` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueFile {
    /// Resolved path of the data file
    pub path: PathBuf,
    /// Declared file type (`BINARY`, `MOTOROLA`, `WAVE`, ...)
    pub file_type: String,
    /// Tracks declared inside this file
    pub tracks: Vec<CueTrack>,
}

/// A `TRACK` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueTrack {
    pub number: u8,
    pub mode: String,
}

/// Whether a trimmed line starts with the `FILE` keyword
fn is_file_line(trimmed: &str) -> bool {
    trimmed.len() > 4
        && trimmed.is_char_boundary(4)
        && trimmed[..4].eq_ignore_ascii_case("FILE")
        && trimmed[4..].starts_with(char::is_whitespace)
}

/// Extract the raw path and type from a `FILE` line
fn parse_file_line(trimmed: &str) -> Option<(&str, &str)> {
    let caps = QUOTED_FILE_RE
        .captures(trimmed)
        .or_else(|| BARE_FILE_RE.captures(trimmed))?;
    let path = caps.get(1)?.as_str();
    let file_type = caps.get(2)?.as_str();
    Some((path, file_type))
}

fn parse_track_line(trimmed: &str) -> Option<CueTrack> {
    let mut parts = trimmed.split_whitespace();
    if !parts.next()?.eq_ignore_ascii_case("TRACK") {
        return None;
    }
    let number = parts.next()?.parse().ok()?;
    let mode = parts.next()?.to_string();
    Some(CueTrack { number, mode })
}

impl CueSheet {
    /// Parse sheet text, resolving data-file paths against `base_dir`
    ///
    /// `FILE` lines that do not carry a path and type are skipped here but
    /// still count towards [`count_file_lines`].
    pub fn parse(content: &str, base_dir: &Path) -> Self {
        let mut files: Vec<CueFile> = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if is_file_line(trimmed) {
                if let Some((raw, file_type)) = parse_file_line(trimmed) {
                    files.push(CueFile {
                        path: base_dir.join(raw),
                        file_type: file_type.to_uppercase(),
                        tracks: Vec::new(),
                    });
                }
            } else if let Some(track) = parse_track_line(trimmed)
                && let Some(file) = files.last_mut()
            {
                file.tracks.push(track);
            }
        }

        Self { files }
    }

    /// Read and parse a sheet from disk
    pub async fn load(sheet_path: &Path) -> Result<Self> {
        let content = read_sheet(sheet_path).await?;
        Ok(Self::parse(&content, &sheet_dir(sheet_path)?))
    }

    /// Data-file paths in declaration order
    pub fn references(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Total number of tracks across all files
    pub fn track_count(&self) -> usize {
        self.files.iter().map(|f| f.tracks.len()).sum()
    }
}

/// Count `FILE` lines (case-insensitive, leading whitespace ignored)
pub fn count_file_lines(content: &str) -> usize {
    content
        .lines()
        .filter(|line| is_file_line(line.trim()))
        .count()
}

async fn read_sheet(sheet_path: &Path) -> Result<String> {
    tokio::fs::read_to_string(sheet_path).await.map_err(|e| {
        Error::IoError(format!("Failed to read sheet {}: {e}", sheet_path.display()))
    })
}

/// Absolute directory containing the sheet
fn sheet_dir(sheet_path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(sheet_path)?;
    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/")))
}

/// Data files referenced by a sheet, as absolute paths in declaration order
pub async fn extract_references(sheet_path: &Path) -> Result<Vec<PathBuf>> {
    Ok(CueSheet::load(sheet_path).await?.references())
}

/// First data file referenced by a sheet
///
/// Fails with a parse error when the sheet has no usable `FILE` entry.
pub async fn resolve_first_reference(sheet_path: &Path) -> Result<PathBuf> {
    extract_references(sheet_path)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            Error::ParseError("Unable to locate a referenced BIN file in the CUE sheet.".to_string())
        })
}

/// Sum of the sizes of referenced files that exist
///
/// Missing or non-regular files are skipped; a sheet without references
/// totals zero.
pub async fn total_referenced_size(sheet_path: &Path) -> Result<u64> {
    let mut total = 0u64;
    for reference in extract_references(sheet_path).await? {
        match tokio::fs::metadata(&reference).await {
            Ok(meta) if meta.is_file() => total += meta.len(),
            Ok(_) => {}
            Err(e) => debug!("Skipping {}: {}", reference.display(), e),
        }
    }
    Ok(total)
}

/// Number of `FILE` lines in a sheet
pub async fn count_file_entries(sheet_path: &Path) -> Result<usize> {
    Ok(count_file_lines(&read_sheet(sheet_path).await?))
}
