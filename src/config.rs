// src/config.rs

//! Runtime settings
//!
//! Settings come from an optional TOML file and are then overridden by the
//! environment. The orchestrators receive a [`Settings`] value explicitly and
//! never read the environment themselves.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Converter command template; must contain `{cue}` and `{vcd}`
pub const CONVERTER_CMD_ENV: &str = "POPS_CONVERTER_CMD";

/// Explicit launcher stub template path
pub const LAUNCHER_TEMPLATE_ENV: &str = "POPS_ELF_TEMPLATE";

/// Explicit merge tool path
pub const MERGE_TOOL_ENV: &str = "BINMERGE_PATH";

/// Directory holding bundled assets (tools and catalogs)
pub const RESOURCE_ROOT_ENV: &str = "DISCSHELF_RESOURCE_ROOT";

/// Base URL of the cover art database
pub const ART_URL_ENV: &str = "DISCSHELF_ART_URL";

/// Settings consumed by the library core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Shell command template for the converter (`{cue}` / `{vcd}` placeholders)
    pub converter_command: Option<String>,
    /// Launcher stub template to copy for converted POPS images
    pub launcher_template: Option<PathBuf>,
    /// Merge tool executable, takes precedence over the bundled one
    pub merge_tool: Option<PathBuf>,
    /// Root for bundled assets
    pub resource_root: Option<PathBuf>,
    /// Extra directory searched first for catalog files
    pub catalog_dir: Option<PathBuf>,
    /// Cover art database, defaults to the public OPL art repository
    pub art_database_url: Option<String>,
}

impl Settings {
    /// Load settings from `path` (if it exists) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Parse a TOML settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let settings: Self = toml::from_str(&content).map_err(|e| {
            Error::ConfigError(format!("Invalid config {}: {e}", path.display()))
        })?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the environment in production)
    ///
    /// Empty values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(CONVERTER_CMD_ENV) {
            self.converter_command = Some(value);
        }
        if let Some(value) = get(LAUNCHER_TEMPLATE_ENV) {
            self.launcher_template = Some(PathBuf::from(value));
        }
        if let Some(value) = get(MERGE_TOOL_ENV) {
            self.merge_tool = Some(PathBuf::from(value));
        }
        if let Some(value) = get(RESOURCE_ROOT_ENV) {
            self.resource_root = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ART_URL_ENV) {
            self.art_database_url = Some(value);
        }
    }

    /// Default config file location (`$XDG_CONFIG_HOME/discshelf/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("discshelf").join("config.toml"))
    }
}
