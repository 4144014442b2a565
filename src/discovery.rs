// src/discovery.rs

//! Ordered-candidate path discovery
//!
//! Bundled tools and catalog files can live in several places depending on
//! how the application was installed. Discovery is a pure function over an
//! ordered candidate list and an existence predicate so the search order is
//! testable without touching the filesystem.

use std::path::{Path, PathBuf};

/// Directory (relative to a root) holding the bundled tools
const TOOLS_DIR: &str = "assets/tools";

/// Subdirectory packagers use for binaries that must stay unpacked
const UNPACKED_DIR: &str = "app.asar.unpacked";

/// Return the first candidate for which `exists` holds
pub fn first_existing<I, F>(candidates: I, exists: F) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
    F: Fn(&Path) -> bool,
{
    candidates.into_iter().find(|candidate| exists(candidate))
}

/// Platform directory name used under `assets/tools/<tool>/`
pub fn platform_dir() -> &'static str {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("windows", "x86_64") => "windows-x64",
        ("windows", _) => "windows-x86",
        ("macos", "aarch64") => "macos-arm64",
        ("macos", _) => "macos-x64",
        (_, "aarch64") => "linux-arm64",
        _ => "linux-x64",
    }
}

/// File name of a tool executable on this platform
pub fn executable_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{tool}.exe")
    } else {
        tool.to_string()
    }
}

/// Roots searched for bundled assets, in priority order
///
/// The resource root (when known) comes first, then the working directory,
/// then the parent and grandparent of the running executable's directory.
pub fn search_roots(resource_root: Option<&Path>) -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Some(root) = resource_root {
        roots.push(root.join(UNPACKED_DIR));
        roots.push(root.to_path_buf());
    }

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        if let Some(parent) = exe_dir.parent() {
            roots.push(parent.to_path_buf());
            if let Some(grandparent) = parent.parent() {
                roots.push(grandparent.to_path_buf());
            }
        }
        roots.push(exe_dir);
    }

    roots
}

/// Candidate locations of a bundled tool under each root
pub fn tool_candidates(roots: &[PathBuf], tool: &str) -> Vec<PathBuf> {
    let exe = executable_name(tool);
    roots
        .iter()
        .map(|root| {
            root.join(TOOLS_DIR)
                .join(tool)
                .join(platform_dir())
                .join(&exe)
        })
        .collect()
}

/// Locate a bundled tool on disk
pub fn find_bundled_tool(resource_root: Option<&Path>, tool: &str) -> Option<PathBuf> {
    let roots = search_roots(resource_root);
    first_existing(tool_candidates(&roots, tool), Path::is_file)
}
