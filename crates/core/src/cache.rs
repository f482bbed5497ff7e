use crate::models::FileRecord;
use std::collections::HashMap;

/// Identifies a cached record. A change in size or mtime is a miss.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub safe_id: String,
    pub mtime: i64,
    pub size: u64,
}

impl CacheKey {
    pub fn for_record(record: &FileRecord) -> Self {
        Self {
            safe_id: record.safe_id.clone(),
            mtime: record.mtime,
            size: record.size,
        }
    }
}

/// Records from an earlier scan, handed to a single scanner run. The scanner
/// only takes entries out, so a seeded cache shrinks as the walk proceeds and
/// never holds more than it was seeded with.
pub trait ScanCache: Send {
    /// Removes and returns the entry for `key`.
    fn take(&mut self, key: &CacheKey) -> Option<FileRecord>;
    fn put(&mut self, key: CacheKey, record: FileRecord);
}

#[derive(Debug, Default)]
pub struct MemoryScanCache {
    entries: HashMap<CacheKey, FileRecord>,
}

impl MemoryScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the cache from an earlier scan's output.
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let entries = records
            .into_iter()
            .filter(|r| r.error.is_none())
            .map(|r| (CacheKey::for_record(&r), r))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ScanCache for MemoryScanCache {
    fn take(&mut self, key: &CacheKey) -> Option<FileRecord> {
        self.entries.remove(key)
    }

    fn put(&mut self, key: CacheKey, record: FileRecord) {
        self.entries.insert(key, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(name: &str, size: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(format!("/w/{name}")),
            safe_id: format!("id-{name}"),
            name: name.to_string(),
            ext: ".txt".to_string(),
            size,
            mtime: 7,
            hint: Some("cached".to_string()),
            bucket: None,
            error: None,
        }
    }

    #[test]
    fn take_consumes_the_entry() {
        let mut cache = MemoryScanCache::from_records(vec![record("a.txt", 1), record("b.txt", 2)]);
        let key = CacheKey::for_record(&record("a.txt", 1));
        assert_eq!(cache.take(&key).map(|r| r.name), Some("a.txt".to_string()));
        assert!(cache.take(&key).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn size_change_misses() {
        let mut cache = MemoryScanCache::from_records(vec![record("a.txt", 1)]);
        assert!(cache.take(&CacheKey::for_record(&record("a.txt", 9))).is_none());
        assert_eq!(cache.len(), 1);
    }
}
