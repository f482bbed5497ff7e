//! Core library: streaming scanner, bucket rules, safe ids and the clustering boundary.

pub mod cache;
pub mod clustering;
pub mod config;
pub mod error;
pub mod guard;
pub mod hashing;
pub mod json_stream;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod safe_map;
pub mod scanner;
pub mod textual;
pub mod walker;

pub use error::{ScanFailure, TimeoutKind};
pub use guard::CancellationToken;
pub use models::{
    FileRecord, ProgressEvent, ProgressStats, ProjectGroup, ScanBatch, ScanError, ScanOptions,
    ScanStatistics,
};
pub use scanner::{scan, ScanStream};
