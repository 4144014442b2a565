// src/catalog.rs

//! Product-code to title lookup
//!
//! Each family has a flat text catalog (`<CODE> <display name>` per line).
//! The first lookup for a family tries an ordered list of candidate files;
//! the first one that parses into a non-empty mapping is kept for the rest
//! of the process. If none does, the family stays unavailable for the
//! process lifetime and later lookups never touch the disk again.
//!
//! Async callers call [`CatalogLookup::prepare`] first so the file reads
//! happen on the blocking pool rather than on a runtime worker.

use crate::config::Settings;
use crate::discovery;
use crate::family::DiscFamily;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Parsed catalog: normalised code -> display name
pub type CatalogMap = HashMap<String, String>;

/// Reads a candidate catalog file
pub type CatalogReader = Arc<dyn Fn(&Path) -> io::Result<String> + Send + Sync>;

/// Title lookup by normalised product code
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Display name for `code`, if the family's catalog knows it
    fn lookup(&self, family: DiscFamily, code: &str) -> Option<String>;

    /// Load `family`'s catalog without blocking the runtime
    async fn prepare(&self, _family: DiscFamily) {}
}

/// Parse catalog text into a map
///
/// Blank lines and lines without both a code and a name are skipped. Names
/// are re-joined with single spaces; codes are stored uppercased.
pub fn parse_catalog(content: &str) -> CatalogMap {
    let mut map = CatalogMap::new();
    for line in content.lines() {
        let mut tokens = line.split_whitespace();
        let Some(code) = tokens.next() else {
            continue;
        };
        let name = tokens.collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            continue;
        }
        map.insert(code.to_uppercase(), name);
    }
    map
}

/// One family's lazily loaded catalog
struct FamilySlot {
    candidates: Vec<PathBuf>,
    loaded: OnceLock<Option<CatalogMap>>,
    /// Serialises async loads so the candidates are read once
    loading: tokio::sync::Mutex<()>,
}

impl FamilySlot {
    fn new(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            loaded: OnceLock::new(),
            loading: tokio::sync::Mutex::new(()),
        }
    }

    fn get(&self, family: DiscFamily, reader: &CatalogReader) -> Option<&CatalogMap> {
        self.loaded
            .get_or_init(|| load_first(family, &self.candidates, reader))
            .as_ref()
    }
}

fn load_first(family: DiscFamily, candidates: &[PathBuf], reader: &CatalogReader) -> Option<CatalogMap> {
    for candidate in candidates {
        let Ok(content) = reader(candidate) else {
            continue;
        };
        let map = parse_catalog(&content);
        if !map.is_empty() {
            info!(
                "Loaded {} catalog from {} ({} titles)",
                family,
                candidate.display(),
                map.len()
            );
            return Some(map);
        }
    }
    debug!("No {} catalog found in {} locations", family, candidates.len());
    None
}

/// Catalog backed by files on disk, loaded at most once per family
pub struct FileCatalog {
    ps2: FamilySlot,
    ps1: FamilySlot,
    reader: CatalogReader,
}

impl FileCatalog {
    /// Create a catalog over explicit candidate lists
    pub fn new(ps2_candidates: Vec<PathBuf>, ps1_candidates: Vec<PathBuf>) -> Self {
        Self::with_reader(
            ps2_candidates,
            ps1_candidates,
            Arc::new(|path: &Path| std::fs::read_to_string(path)),
        )
    }

    /// Create a catalog with a custom file reader
    pub fn with_reader(
        ps2_candidates: Vec<PathBuf>,
        ps1_candidates: Vec<PathBuf>,
        reader: CatalogReader,
    ) -> Self {
        Self {
            ps2: FamilySlot::new(ps2_candidates),
            ps1: FamilySlot::new(ps1_candidates),
            reader,
        }
    }

    /// Create a catalog using the standard search locations
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            candidate_paths(settings, DiscFamily::Ps2),
            candidate_paths(settings, DiscFamily::Ps1),
        )
    }

    fn slot(&self, family: DiscFamily) -> &FamilySlot {
        match family {
            DiscFamily::Ps2 => &self.ps2,
            DiscFamily::Ps1 => &self.ps1,
        }
    }

    /// Whether a catalog could be loaded for `family`
    pub fn is_available(&self, family: DiscFamily) -> bool {
        self.slot(family).get(family, &self.reader).is_some()
    }
}

#[async_trait]
impl CatalogLookup for FileCatalog {
    fn lookup(&self, family: DiscFamily, code: &str) -> Option<String> {
        self.slot(family)
            .get(family, &self.reader)
            .and_then(|map| map.get(&code.to_uppercase()).cloned())
    }

    async fn prepare(&self, family: DiscFamily) {
        let slot = self.slot(family);
        if slot.loaded.get().is_some() {
            return;
        }
        let _loading = slot.loading.lock().await;
        if slot.loaded.get().is_some() {
            return;
        }

        let candidates = slot.candidates.clone();
        let reader = self.reader.clone();
        let map = tokio::task::spawn_blocking(move || load_first(family, &candidates, &reader))
            .await
            .unwrap_or_else(|e| {
                warn!("{} catalog load failed: {}", family, e);
                None
            });
        let _ = slot.loaded.set(map);
    }
}

/// Ordered catalog locations for a family
pub fn candidate_paths(settings: &Settings, family: DiscFamily) -> Vec<PathBuf> {
    let file = family.catalog_file();
    let mut candidates = Vec::new();
    if let Some(dir) = &settings.catalog_dir {
        candidates.push(dir.join(file));
    }
    candidates.extend(
        discovery::search_roots(settings.resource_root.as_deref())
            .into_iter()
            .map(|root| root.join("assets").join(file)),
    );
    candidates
}

/// In-memory catalog, for fixtures and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<DiscFamily, CatalogMap>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a title (the code is uppercased)
    pub fn with_entry(mut self, family: DiscFamily, code: &str, name: &str) -> Self {
        self.entries
            .entry(family)
            .or_default()
            .insert(code.to_uppercase(), name.to_string());
        self
    }
}

#[async_trait]
impl CatalogLookup for StaticCatalog {
    fn lookup(&self, family: DiscFamily, code: &str) -> Option<String> {
        self.entries
            .get(&family)
            .and_then(|map| map.get(&code.to_uppercase()).cloned())
    }
}

static GLOBAL_CATALOG: OnceLock<FileCatalog> = OnceLock::new();

/// Process-wide catalog
///
/// The first caller's settings decide the search locations.
pub fn global_catalog(settings: &Settings) -> &'static FileCatalog {
    GLOBAL_CATALOG.get_or_init(|| FileCatalog::from_settings(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_reader(files: HashMap<PathBuf, String>, reads: Arc<AtomicUsize>) -> CatalogReader {
        Arc::new(move |path: &Path| {
            reads.fetch_add(1, Ordering::SeqCst);
            files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        })
    }

    #[test]
    fn test_parse_catalog() {
        let map = parse_catalog("SLUS-20312   Final  Fantasy X\n\n  \nBROKENLINE\nscus-97113 ICO\r\n");
        assert_eq!(map.len(), 2);
        assert_eq!(map["SLUS-20312"], "Final Fantasy X");
        assert_eq!(map["SCUS-97113"], "ICO");
    }

    #[test]
    fn test_lookup_returns_stored_name() {
        let files = HashMap::from([(
            PathBuf::from("/assets/ps2-gameslist.txt"),
            "SLUS-20312 Final Fantasy X\n".to_string(),
        )]);
        let reads = Arc::new(AtomicUsize::new(0));
        let catalog = FileCatalog::with_reader(
            vec![PathBuf::from("/assets/ps2-gameslist.txt")],
            vec![],
            counting_reader(files, reads.clone()),
        );

        assert_eq!(
            catalog.lookup(DiscFamily::Ps2, "slus-20312").as_deref(),
            Some("Final Fantasy X")
        );
        assert_eq!(catalog.lookup(DiscFamily::Ps2, "SLUS-99999"), None);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_usable_candidate_wins() {
        let files = HashMap::from([
            (PathBuf::from("/a/ps1-gameslist.txt"), "\n\n".to_string()),
            (PathBuf::from("/b/ps1-gameslist.txt"), "SCES-00344 Crash Bandicoot\n".to_string()),
            (PathBuf::from("/c/ps1-gameslist.txt"), "SCES-00344 Wrong\n".to_string()),
        ]);
        let reads = Arc::new(AtomicUsize::new(0));
        let catalog = FileCatalog::with_reader(
            vec![],
            vec![
                PathBuf::from("/a/ps1-gameslist.txt"),
                PathBuf::from("/b/ps1-gameslist.txt"),
                PathBuf::from("/c/ps1-gameslist.txt"),
            ],
            counting_reader(files, reads.clone()),
        );

        assert_eq!(
            catalog.lookup(DiscFamily::Ps1, "SCES-00344").as_deref(),
            Some("Crash Bandicoot")
        );
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_catalog_is_never_retried() {
        let reads = Arc::new(AtomicUsize::new(0));
        let catalog = FileCatalog::with_reader(
            vec![PathBuf::from("/x/ps2-gameslist.txt"), PathBuf::from("/y/ps2-gameslist.txt")],
            vec![],
            counting_reader(HashMap::new(), reads.clone()),
        );

        for _ in 0..5 {
            assert_eq!(catalog.lookup(DiscFamily::Ps2, "SLUS-20312"), None);
        }
        assert!(!catalog.is_available(DiscFamily::Ps2));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_families_load_independently() {
        let files = HashMap::from([(
            PathBuf::from("/ps1.txt"),
            "SLUS-00594 Metal Gear Solid\n".to_string(),
        )]);
        let reads = Arc::new(AtomicUsize::new(0));
        let catalog = FileCatalog::with_reader(
            vec![PathBuf::from("/ps2.txt")],
            vec![PathBuf::from("/ps1.txt")],
            counting_reader(files, reads.clone()),
        );

        assert_eq!(catalog.lookup(DiscFamily::Ps2, "SLUS-00594"), None);
        assert_eq!(
            catalog.lookup(DiscFamily::Ps1, "SLUS-00594").as_deref(),
            Some("Metal Gear Solid")
        );
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_prepare_reads_on_the_blocking_pool() {
        let runtime_thread = std::thread::current().id();
        let readers = Arc::new(Mutex::new(Vec::new()));
        let captured = readers.clone();
        let reader: CatalogReader = Arc::new(move |_path: &Path| {
            captured.lock().unwrap().push(std::thread::current().id());
            Ok("SLUS-20312 Final Fantasy X\n".to_string())
        });
        let catalog = FileCatalog::with_reader(vec![PathBuf::from("/ps2.txt")], vec![], reader);

        catalog.prepare(DiscFamily::Ps2).await;
        catalog.prepare(DiscFamily::Ps2).await;
        assert_eq!(
            catalog.lookup(DiscFamily::Ps2, "SLUS-20312").as_deref(),
            Some("Final Fantasy X")
        );

        let readers = readers.lock().unwrap();
        assert_eq!(readers.len(), 1);
        assert_ne!(readers[0], runtime_thread);
    }

    #[test]
    fn test_static_catalog() {
        let catalog = StaticCatalog::new().with_entry(DiscFamily::Ps2, "sles-50330", "Kingdom Hearts");
        assert_eq!(
            catalog.lookup(DiscFamily::Ps2, "SLES-50330").as_deref(),
            Some("Kingdom Hearts")
        );
        assert_eq!(catalog.lookup(DiscFamily::Ps1, "SLES-50330"), None);
    }

    #[test]
    fn test_candidate_paths_prefers_catalog_dir() {
        let settings = Settings {
            catalog_dir: Some(PathBuf::from("/custom")),
            resource_root: Some(PathBuf::from("/res")),
            ..Default::default()
        };
        let candidates = candidate_paths(&settings, DiscFamily::Ps1);
        assert_eq!(candidates[0], PathBuf::from("/custom/ps1-gameslist.txt"));
        assert_eq!(
            candidates[1],
            PathBuf::from("/res/app.asar.unpacked/assets/ps1-gameslist.txt")
        );
        assert_eq!(candidates[2], PathBuf::from("/res/assets/ps1-gameslist.txt"));
    }
}
