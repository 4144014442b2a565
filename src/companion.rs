// src/companion.rs

//! Launcher stubs and the app registry for POPS images
//!
//! Every converted `<base>.VCD` needs a launcher stub named `XX.<base>.ELF`
//! next to it in `<root>/POPS`, and an entry in `<root>/conf_apps.cfg`:
//!
//! ```text
//! (PSX) <label>=mass:/POPS/XX.<base>.ELF
//! ```
//!
//! Creating either is idempotent. Registry entries are matched by the
//! `/POPS/<stub>` substring, so a relabelled line still counts as present.

use crate::config::{LAUNCHER_TEMPLATE_ENV, Settings};
use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Directory holding POPS images and their launchers
pub const POPS_DIR: &str = "POPS";

/// Registry file name under the library root
pub const REGISTRY_FILE: &str = "conf_apps.cfg";

/// Preferred launcher template inside `POPS`
pub const WELL_KNOWN_TEMPLATE: &str = "POPSTARTER.ELF";

static LAUNCHER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^XX\..+\.ELF$").expect("Invalid launcher pattern")
});

/// Launcher stub name for an image base name
pub fn launcher_name(base: &str) -> String {
    format!("XX.{base}.ELF")
}

/// Launcher stub name for an image path
pub fn launcher_name_for(image: &Path) -> String {
    let base = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    launcher_name(&base)
}

/// Whether `name` looks like a launcher stub
pub fn is_launcher_name(name: &str) -> bool {
    LAUNCHER_PATTERN.is_match(name)
}

fn registry_path(root: &Path) -> PathBuf {
    root.join(REGISTRY_FILE)
}

fn registry_marker(launcher: &str) -> String {
    format!("/{POPS_DIR}/{launcher}")
}

/// Locate the template a launcher is copied from
///
/// Order: explicit override, `POPS/POPSTARTER.ELF`, then the first existing
/// stub in `POPS` by name.
pub async fn find_launcher_template(root: &Path, explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(Some(path.to_path_buf()));
    }

    let pops = root.join(POPS_DIR);
    let well_known = pops.join(WELL_KNOWN_TEMPLATE);
    if tokio::fs::metadata(&well_known).await.is_ok_and(|m| m.is_file()) {
        return Ok(Some(well_known));
    }

    let mut entries = match tokio::fs::read_dir(&pops).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut stubs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_launcher_name(&name) && entry.file_type().await?.is_file() {
            stubs.push(name);
        }
    }
    stubs.sort();
    Ok(stubs.into_iter().next().map(|name| pops.join(name)))
}

/// Result of [`ensure_launcher`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherStub {
    pub new_path: PathBuf,
    pub elf_name: String,
    /// The stub already existed
    pub skipped: bool,
}

/// Make sure the launcher stub for `image` exists under `root`
pub async fn ensure_launcher(image: &Path, root: &Path, settings: &Settings) -> Result<LauncherStub> {
    let Some(template) = find_launcher_template(root, settings.launcher_template.as_deref()).await?
    else {
        return Err(Error::ConfigError(format!(
            "Missing POPS ELF template. Set {LAUNCHER_TEMPLATE_ENV} or place the {WELL_KNOWN_TEMPLATE} file in {POPS_DIR}."
        )));
    };

    let pops = root.join(POPS_DIR);
    let elf_name = launcher_name_for(image);
    let target = pops.join(&elf_name);

    if tokio::fs::try_exists(&target).await? {
        debug!("Launcher {} already present", target.display());
        return Ok(LauncherStub {
            new_path: target,
            elf_name,
            skipped: true,
        });
    }

    tokio::fs::create_dir_all(&pops).await?;
    tokio::fs::copy(&template, &target).await.map_err(|e| {
        Error::IoError(format!(
            "Failed to copy launcher template {}: {e}",
            template.display()
        ))
    })?;
    info!("Created launcher {} from {}", target.display(), template.display());

    Ok(LauncherStub {
        new_path: target,
        elf_name,
        skipped: false,
    })
}

/// Remove a launcher stub; returns false when it was already gone
pub async fn remove_launcher(root: &Path, elf_name: &str) -> Result<bool> {
    let path = root.join(POPS_DIR).join(elf_name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {
            info!("Removed launcher {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::IoError(format!("Failed to remove {}: {e}", path.display()))),
    }
}

/// Strip characters the registry format cannot hold
pub fn sanitize_label(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '"' | '\r' | '\n'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Registry line for a launcher
pub fn registry_entry(display_name: Option<&str>, elf_name: &str) -> String {
    let label = display_name
        .map(sanitize_label)
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| sanitize_label(elf_name));
    format!("(PSX) {label}=mass:/{POPS_DIR}/{elf_name}")
}

/// Result of a registry change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryUpdate {
    pub path: PathBuf,
    /// Line that was added, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Nothing had to change
    pub skipped: bool,
}

async fn read_registry(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::IoError(format!("Failed to read {}: {e}", path.display()))),
    }
}

fn registry_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

async fn write_registry(path: &Path, lines: &[&str]) -> Result<()> {
    let content = if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    };
    tokio::fs::write(path, content)
        .await
        .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", path.display())))
}

/// Add a registry line for `elf_name` unless one already references it
pub async fn add_registry_entry(root: &Path, display_name: Option<&str>, elf_name: &str) -> Result<RegistryUpdate> {
    let path = registry_path(root);
    let content = read_registry(&path).await?.unwrap_or_default();
    let mut lines = registry_lines(&content);

    let marker = registry_marker(elf_name);
    if lines.iter().any(|line| line.contains(&marker)) {
        debug!("{} already lists {}", path.display(), elf_name);
        return Ok(RegistryUpdate {
            path,
            entry: None,
            skipped: true,
        });
    }

    let entry = registry_entry(display_name, elf_name);
    lines.push(&entry);
    write_registry(&path, &lines).await?;
    info!("Registered {} in {}", elf_name, path.display());

    Ok(RegistryUpdate {
        path,
        entry: Some(entry.clone()),
        skipped: false,
    })
}

/// Remove every registry line referencing `elf_name`
pub async fn remove_registry_entry(root: &Path, elf_name: &str) -> Result<RegistryUpdate> {
    let path = registry_path(root);
    let Some(content) = read_registry(&path).await? else {
        return Ok(RegistryUpdate {
            path,
            entry: None,
            skipped: true,
        });
    };

    let lines = registry_lines(&content);
    let marker = registry_marker(elf_name);
    let kept: Vec<&str> = lines.iter().copied().filter(|line| !line.contains(&marker)).collect();
    if kept.len() == lines.len() {
        return Ok(RegistryUpdate {
            path,
            entry: None,
            skipped: true,
        });
    }

    write_registry(&path, &kept).await?;
    info!("Unregistered {} from {}", elf_name, path.display());
    Ok(RegistryUpdate {
        path,
        entry: None,
        skipped: false,
    })
}
