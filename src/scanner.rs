// src/scanner.rs

//! Product-code scanning
//!
//! Disc images are scanned as raw bytes for the family's product-code
//! pattern. The file is read in fixed 1 MiB chunks; the last
//! [`OVERLAP_BYTES`] of each window are carried in front of the next chunk so
//! a code split across a chunk boundary still matches. Matching runs on bytes
//! (`regex::bytes`), so offsets are exact and no text decoding is involved.
//!
//! A sheet is never scanned itself: its first referenced data file is.

use crate::catalog::CatalogLookup;
use crate::error::{Error, Outcome, Result};
use crate::family::{self, DiscFamily};
use crate::sheet;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bytes read per chunk
pub const CHUNK_BYTES: usize = 1024 * 1024;

/// Bytes carried over between chunks; exceeds the longest code literal
pub const OVERLAP_BYTES: usize = 64;

const _: () = assert!(OVERLAP_BYTES > DiscFamily::max_code_len());

/// A product code found in an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameIdentity {
    /// Code as found on disc, session marker removed (`SLUS_203.12`)
    pub game_id: String,
    /// Catalog key (`SLUS-20312`)
    pub formatted_game_id: String,
    /// Title from the family catalog, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    /// Family whose pattern matched
    pub family: DiscFamily,
}

/// Fill `buf` from `reader`, stopping early only at end of file
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Scan a byte stream for the first product code of `family`
///
/// Returns the code with its session marker stripped, or `None` once the
/// stream is exhausted. The stream is consumed at most once and scanning
/// stops at the first match.
pub fn scan_reader<R: Read>(mut reader: R, family: DiscFamily) -> io::Result<Option<String>> {
    scan_reader_with_chunk(&mut reader, family, CHUNK_BYTES)
}

fn scan_reader_with_chunk<R: Read>(
    reader: &mut R,
    family: DiscFamily,
    chunk_bytes: usize,
) -> io::Result<Option<String>> {
    let pattern = family.pattern();
    let mut chunk = vec![0u8; chunk_bytes];
    let mut window: Vec<u8> = Vec::with_capacity(OVERLAP_BYTES + chunk_bytes);
    let mut offset: u64 = 0;

    loop {
        let read = read_chunk(reader, &mut chunk)?;
        if read == 0 {
            return Ok(None);
        }

        window.extend_from_slice(&chunk[..read]);
        if let Some(found) = pattern.find(&window) {
            let raw = String::from_utf8_lossy(found.as_bytes());
            debug!(
                target: "scanner",
                "Matched {} near byte {}",
                raw,
                offset + found.start() as u64
            );
            return Ok(Some(family::strip_session_marker(&raw).to_string()));
        }

        offset += read as u64;
        if window.len() > OVERLAP_BYTES {
            window.drain(..window.len() - OVERLAP_BYTES);
        }
    }
}

/// File whose bytes are scanned for `path`
async fn scan_target(path: &Path) -> Result<PathBuf> {
    let is_sheet = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("cue"));
    if is_sheet {
        sheet::resolve_first_reference(path).await
    } else {
        Ok(path.to_path_buf())
    }
}

/// Identify the game in an image or sheet
pub async fn scan_file(path: &Path, catalog: &dyn CatalogLookup) -> Result<GameIdentity> {
    let family = DiscFamily::for_path(path);
    let target = scan_target(path).await?;
    debug!(target: "scanner", "Scanning {} as {}", target.display(), family);

    let open_path = target.clone();
    let found = tokio::task::spawn_blocking(move || -> Result<Option<String>> {
        let file = File::open(&open_path).map_err(|e| {
            Error::IoError(format!("Unable to open {}: {e}", open_path.display()))
        })?;
        Ok(scan_reader(file, family)?)
    })
    .await
    .map_err(|e| Error::IoError(format!("Scan task failed: {e}")))??;

    let Some(game_id) = found else {
        return Err(Error::NotFoundError(
            "Could not locate a game ID inside the provided file.".to_string(),
        ));
    };

    let formatted_game_id = family::normalize_code(&game_id);
    catalog.prepare(family).await;
    let game_name = catalog.lookup(family, &formatted_game_id);
    info!(
        target: "scanner",
        "Identified {} as {} ({})",
        path.display(),
        formatted_game_id,
        game_name.as_deref().unwrap_or("unknown title")
    );

    Ok(GameIdentity {
        game_id,
        formatted_game_id,
        game_name,
        family,
    })
}

/// [`scan_file`] as a uniform outcome
pub async fn identify(path: &Path, catalog: &dyn CatalogLookup) -> Outcome<GameIdentity> {
    scan_file(path, catalog).await.into()
}
