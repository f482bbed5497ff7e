use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// safe_id → real path. Entries are write-once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeMap {
    entries: BTreeMap<String, PathBuf>,
}

impl SafeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already mapped; the first mapping stays.
    pub fn insert(&mut self, safe_id: impl Into<String>, path: impl Into<PathBuf>) -> bool {
        use std::collections::btree_map::Entry;
        match self.entries.entry(safe_id.into()) {
            Entry::Vacant(slot) => {
                slot.insert(path.into());
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn resolve(&self, safe_id: &str) -> Option<&Path> {
        self.entries.get(safe_id).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read safe map {:?}", path))?;
        let entries: BTreeMap<String, PathBuf> = serde_json::from_str(&raw)
            .with_context(|| format!("Safe map {:?} is incomplete or invalid", path))?;
        Ok(Self { entries })
    }
}
