//! Append-only JSON Lines journal of organizer actions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalCode {
    Move,
    Copy,
    /// Destination name taken under the skip policy.
    Skip,
    /// Source already sits at its resolved destination.
    SkipExists,
    Miss,
    Error,
}

impl JournalCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalCode::Move => "MOVE",
            JournalCode::Copy => "COPY",
            JournalCode::Skip => "SKIP",
            JournalCode::SkipExists => "SKIP_EXISTS",
            JournalCode::Miss => "MISS",
            JournalCode::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for JournalCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    #[serde(rename = "ts")]
    pub timestamp_ms: i64,
    pub code: JournalCode,
    #[serde(rename = "src")]
    pub source: PathBuf,
    #[serde(rename = "dst", default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl JournalRecord {
    pub fn new(code: JournalCode, source: impl Into<PathBuf>) -> Self {
        Self {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            code,
            source: source.into(),
            destination: None,
            details: Map::new(),
        }
    }

    pub fn with_destination(mut self, dst: impl Into<PathBuf>) -> Self {
        self.destination = Some(dst.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode journal record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Single writer for one organizer run. Every record is flushed before
/// `append` returns.
pub struct JournalWriter {
    path: PathBuf,
    file: File,
    written: usize,
}

impl JournalWriter {
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        let io_err = |source| JournalError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            written: 0,
        })
    }

    pub fn append(&mut self, record: &JournalRecord) -> Result<(), JournalError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .and_then(|_| self.file.flush())
            .map_err(|source| JournalError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

/// Parsed journal contents. Lines that do not parse are counted, not fatal.
#[derive(Debug, Default)]
pub struct JournalContents {
    pub records: Vec<JournalRecord>,
    pub malformed: usize,
}

pub fn read_journal(path: &Path) -> Result<JournalContents, JournalError> {
    let file = File::open(path).map_err(|source| JournalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut contents = JournalContents::default();
    for line in BufReader::new(file).split(b'\n') {
        let line = line.map_err(|source| JournalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<JournalRecord>(&line) {
            Ok(record) => contents.records.push(record),
            Err(_) => contents.malformed += 1,
        }
    }
    Ok(contents)
}
