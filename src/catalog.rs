use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// The selectable items: names of the regular files in the ROM directory.
///
/// Owned by the main thread and rebuilt wholesale on every refresh.
#[derive(Debug, Clone)]
pub struct Catalog {
    dir: PathBuf,
    items: Vec<String>,
}

impl Catalog {
    /// Create a catalog over `dir` and list it once.
    pub fn load(dir: impl Into<PathBuf>) -> Self {
        let mut catalog = Self {
            dir: dir.into(),
            items: Vec::new(),
        };
        catalog.refresh();
        catalog
    }

    /// Re-list the directory, replacing the previous contents.
    pub fn refresh(&mut self) {
        self.items = list_files(&self.dir);
        debug!(dir = %self.dir.display(), count = self.items.len(), "catalog refreshed");
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of an item, as handed to the emulator.
    pub fn path_of(&self, item: &str) -> PathBuf {
        self.dir.join(item)
    }
}

/// Suffix of a file still being copied into the catalog directory.
const STAGING_SUFFIX: &str = ".part";

/// Where an incoming `name` is written before it is renamed into place.
pub fn staging_name(name: &str) -> String {
    format!(".{name}{STAGING_SUFFIX}")
}

fn is_staging(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

/// Names of the regular files directly inside `dir`, sorted.
///
/// Copies still in flight are left out. Never fails: an unreadable
/// directory yields an empty list and a warning.
pub fn list_files(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Error accessing folder {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !is_staging(name))
        .collect();
    // read_dir order is filesystem dependent
    names.sort();
    names
}
