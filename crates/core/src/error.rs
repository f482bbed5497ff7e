use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Overall,
    PerBatch,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutKind::Overall => write!(f, "overall"),
            TimeoutKind::PerBatch => write!(f, "per-batch"),
        }
    }
}

/// Failures that end a scan call. Per-file problems never show up here; they
/// travel inside the batches as `ScanError`s.
#[derive(Debug, Error)]
pub enum ScanFailure {
    #[error("scan cancelled")]
    Cancelled,
    #[error("{0} timeout exceeded")]
    Timeout(TimeoutKind),
    #[error("missing root: {0:?}")]
    MissingRoot(PathBuf),
    #[error("invalid glob pattern: {0}")]
    InvalidPattern(#[from] globset::Error),
    #[error("invalid scan options: {0}")]
    InvalidOptions(String),
}
