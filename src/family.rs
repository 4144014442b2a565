// src/family.rs

//! Product-code families
//!
//! PS2 discs (family A) and PS1 discs (family B) embed their product code,
//! e.g. `SLUS_203.12;1`, in the volume's boot file name. Both families use
//! the same `PREFIX_NNN.NN[;1]` shape but with different prefix sets.

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// PS2 product-code prefixes
pub const PS2_PREFIXES: &[&str] = &[
    "SLUS", "SCUS", "SLES", "SCES", "SLPM", "SLPS", "SCPS", "SCPM", "SLAJ", "SCAJ", "SLKA", "SCKA",
    "SCED", "SCCS",
];

/// PS1 product-code prefixes
pub const PS1_PREFIXES: &[&str] = &[
    "SLUS", "SLES", "SCUS", "SCES", "SLPS", "SCPS", "SLPM", "SCED", "SLED", "SLKA", "SCKA", "SIPS",
];

/// Disc session marker that may trail a code on the disc
const SESSION_MARKER: &str = ";1";

fn build_pattern(prefixes: &[&str]) -> Regex {
    let pattern = format!(r"(?:{})_[0-9]{{3}}\.[0-9]{{2}}(?:;1)?", prefixes.join("|"));
    Regex::new(&pattern).expect("product code pattern is valid")
}

static PS2_PATTERN: LazyLock<Regex> = LazyLock::new(|| build_pattern(PS2_PREFIXES));
static PS1_PATTERN: LazyLock<Regex> = LazyLock::new(|| build_pattern(PS1_PREFIXES));

/// Which catalog and code pattern applies to an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscFamily {
    /// PlayStation 2 DVD/CD images (`.iso`, `.zso`, ...)
    Ps2,
    /// PlayStation 1 images (`.cue` sheets and POPS `.vcd` images)
    Ps1,
}

impl DiscFamily {
    /// Pick the family from a file's extension
    ///
    /// Sheets and `.vcd` images are PS1 titles; everything else is scanned
    /// as PS2.
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("cue") | Some("vcd") => Self::Ps1,
            _ => Self::Ps2,
        }
    }

    /// Compiled product-code pattern
    pub fn pattern(&self) -> &'static Regex {
        match self {
            Self::Ps2 => &PS2_PATTERN,
            Self::Ps1 => &PS1_PATTERN,
        }
    }

    /// Catalog file name for this family
    pub fn catalog_file(&self) -> &'static str {
        match self {
            Self::Ps2 => "ps2-gameslist.txt",
            Self::Ps1 => "ps1-gameslist.txt",
        }
    }

    /// Longest literal a code of this family can occupy (`XXXX_NNN.NN;1`)
    pub const fn max_code_len() -> usize {
        13
    }
}

impl std::fmt::Display for DiscFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ps2 => write!(f, "PS2"),
            Self::Ps1 => write!(f, "PS1"),
        }
    }
}

/// Strip the trailing `;1` session marker
pub fn strip_session_marker(code: &str) -> &str {
    code.strip_suffix(SESSION_MARKER).unwrap_or(code)
}

/// Normalise a code for catalog lookup: `SLUS_203.12` becomes `SLUS-20312`
pub fn normalize_code(code: &str) -> String {
    code.replacen('_', "-", 1).replace('.', "").to_uppercase()
}
