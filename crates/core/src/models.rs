use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 128;
pub const DEFAULT_SAMPLE_BYTES: usize = 4096;
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(200);

/// Immutable settings for one scanner run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub roots: Vec<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Deepest directory level to descend into; root contents are level 0.
    pub max_depth: Option<usize>,
    pub batch_size: usize,
    pub sample_bytes: usize,
    pub throttle_interval: Duration,
    pub overall_timeout: Option<Duration>,
    pub per_batch_timeout: Option<Duration>,
    pub follow_symlinks: bool,
}

impl ScanOptions {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            include: Vec::new(),
            exclude: Vec::new(),
            max_depth: None,
            batch_size: DEFAULT_BATCH_SIZE,
            sample_bytes: DEFAULT_SAMPLE_BYTES,
            throttle_interval: DEFAULT_THROTTLE,
            overall_timeout: None,
            per_batch_timeout: None,
            follow_symlinks: false,
        }
    }
}

/// One scanned file. The payload shape is what lands in the scan output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub safe_id: String,
    pub name: String,
    pub ext: String,
    pub size: u64,
    pub mtime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressStats {
    pub processed: u64,
    pub discovered: u64,
    pub skipped: u64,
    pub elapsed_seconds: f64,
    pub eta_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub stats: ProgressStats,
    /// `None` on the final event of a run.
    pub current_path: Option<PathBuf>,
}

pub type ProgressCallback = Box<dyn FnMut(&ProgressEvent) + Send>;

#[derive(Debug, Clone)]
pub struct ScanBatch {
    pub records: Vec<FileRecord>,
    pub errors: Vec<ScanError>,
    pub stats: ProgressStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanStatistics {
    pub processed: u64,
    pub discovered: u64,
    pub skipped: u64,
    pub errors: u64,
    pub duration_seconds: f64,
}

/// A project label with the real paths that belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGroup {
    pub label: String,
    pub paths: Vec<PathBuf>,
}
