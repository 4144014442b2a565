// src/merge.rs

//! Multi-track sheet consolidation
//!
//! The POPS converter only accepts single-file sheets. Sheets declaring more
//! than one `FILE` are first merged with an external tool (`binmerge`) into a
//! fresh temporary directory. The directory is returned as a [`TempDir`]
//! owned by the caller, so it is removed recursively whenever the caller
//! drops it, whatever the outcome of the job.

use crate::config::{MERGE_TOOL_ENV, Settings};
use crate::discovery;
use crate::error::{Error, Result};
use crate::exec::{CommandRunner, CommandSpec, run_checked};
use crate::progress::{ProgressSink, Stage};
use crate::sheet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Name of the bundled merge tool
pub const MERGE_TOOL: &str = "binmerge";

/// Result of [`merge_if_needed`]
#[derive(Debug)]
pub struct MergeOutcome {
    /// Sheet to hand to the converter
    pub sheet_path: PathBuf,
    /// Whether a merge was performed
    pub merged: bool,
    /// Directory holding the merged files; deleted on drop
    pub temp_dir: Option<TempDir>,
}

impl MergeOutcome {
    fn unchanged(sheet_path: &Path) -> Self {
        Self {
            sheet_path: sheet_path.to_path_buf(),
            merged: false,
            temp_dir: None,
        }
    }

    /// Path of the temporary directory, if one was created
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }
}

/// Replace characters that are illegal in file names with `_`
pub fn sanitize_filename(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Base name the merged files are written under
pub fn merged_base_name(sheet_path: &Path) -> String {
    let stem = sheet_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_filename(&format!("{stem}_merged"))
}

/// Find the merge tool: explicit setting first, then the bundled copy
pub fn locate_merge_tool(settings: &Settings) -> Result<PathBuf> {
    if let Some(path) = &settings.merge_tool {
        return Ok(path.clone());
    }
    discovery::find_bundled_tool(settings.resource_root.as_deref(), MERGE_TOOL).ok_or_else(|| {
        Error::ConfigError(format!(
            "Multi-track BIN/CUE detected but {} is missing. Set {MERGE_TOOL_ENV} or bundle binmerge.",
            discovery::executable_name(MERGE_TOOL)
        ))
    })
}

/// Merge `sheet_path` into a single track when it declares several files
pub async fn merge_if_needed(
    sheet_path: &Path,
    settings: &Settings,
    runner: &dyn CommandRunner,
    sink: &dyn ProgressSink,
) -> Result<MergeOutcome> {
    let entries = sheet::count_file_entries(sheet_path).await?;
    if entries <= 1 {
        return Ok(MergeOutcome::unchanged(sheet_path));
    }

    sink.stage(Stage::Merging);
    info!(
        target: "binmerge",
        "Multi-track CUE detected ({} tracks). Running binmerge...",
        entries
    );

    let tool = locate_merge_tool(settings)?;
    let temp_dir = tempfile::Builder::new()
        .prefix("binmerge-")
        .tempdir()
        .map_err(|e| Error::IoError(format!("Failed to create merge directory: {e}")))?;
    let base_name = merged_base_name(sheet_path);
    debug!(target: "binmerge", "binmerge: {}", tool.display());
    debug!(target: "binmerge", "binmerge output dir: {}", temp_dir.path().display());

    let spec = CommandSpec::program(
        &tool,
        [
            "--outdir".into(),
            temp_dir.path().as_os_str().to_owned(),
            sheet_path.as_os_str().to_owned(),
            base_name.clone().into(),
        ],
    );
    run_checked(runner, &spec).await?;

    let merged_sheet = temp_dir.path().join(format!("{base_name}.cue"));
    if !tokio::fs::try_exists(&merged_sheet).await.unwrap_or(false) {
        return Err(Error::NotFoundError(format!(
            "binmerge finished but {} was not created",
            merged_sheet.display()
        )));
    }

    info!(target: "binmerge", "binmerge completed: {}", merged_sheet.display());
    Ok(MergeOutcome {
        sheet_path: merged_sheet,
        merged: true,
        temp_dir: Some(temp_dir),
    })
}
