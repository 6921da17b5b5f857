//! Per-folder "do not sort" flags.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Exclusion flags for one folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionEntry {
    /// Do not sort this folder.
    pub skip: bool,
    /// Combined with `skip`: do not sort anything beneath it either.
    pub skip_recursive: bool,
}

impl ExclusionEntry {
    fn is_empty(&self) -> bool {
        !self.skip && !self.skip_recursive
    }
}

/// Folder id → exclusion flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionRegistry {
    entries: BTreeMap<String, ExclusionEntry>,
}

impl ExclusionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, folder_id: &str) -> Option<ExclusionEntry> {
        self.entries.get(folder_id).copied()
    }

    pub fn is_excluded(&self, folder_id: &str) -> bool {
        self.get(folder_id).is_some_and(|e| e.skip)
    }

    /// True only if both the skip and the recursive flags are set.
    pub fn is_recursively_excluded(&self, folder_id: &str) -> bool {
        self.get(folder_id).is_some_and(|e| e.skip && e.skip_recursive)
    }

    pub fn set_excluded(&mut self, folder_id: &str) {
        self.update(folder_id, |e| e.skip = true);
    }

    pub fn clear_excluded(&mut self, folder_id: &str) {
        self.update(folder_id, |e| e.skip = false);
    }

    pub fn set_recursive(&mut self, folder_id: &str) {
        self.update(folder_id, |e| e.skip_recursive = true);
    }

    pub fn clear_recursive(&mut self, folder_id: &str) {
        self.update(folder_id, |e| e.skip_recursive = false);
    }

    /// Drop entries whose folder is not in `existing`. Returns how many went.
    pub fn prune_missing(&mut self, existing: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| existing.contains(id));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ExclusionEntry)> {
        self.entries.iter().map(|(id, e)| (id.as_str(), *e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn update(&mut self, folder_id: &str, f: impl FnOnce(&mut ExclusionEntry)) {
        let entry = self.entries.entry(folder_id.to_string()).or_default();
        f(entry);
        if entry.is_empty() {
            self.entries.remove(folder_id);
        }
    }
}
