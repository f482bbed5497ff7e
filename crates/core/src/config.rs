use crate::models::{ScanOptions, DEFAULT_BATCH_SIZE, DEFAULT_SAMPLE_BYTES};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SCHEMA_PATHS: &[&str] = &["src/", "docs/", "data/", "tests/", "images/", "misc/"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub organize: OrganizeSettings,
    #[serde(default)]
    pub cluster: ClusterSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub roots: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_depth: Option<usize>,
    pub batch_size: usize,
    pub sample_bytes: usize,
    pub throttle_ms: u64,
    pub overall_timeout_secs: Option<f64>,
    pub per_batch_timeout_secs: Option<f64>,
    pub follow_symlinks: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            max_depth: None,
            batch_size: DEFAULT_BATCH_SIZE,
            sample_bytes: DEFAULT_SAMPLE_BYTES,
            throttle_ms: 200,
            overall_timeout_secs: None,
            per_batch_timeout_secs: None,
            follow_symlinks: false,
        }
    }
}

impl ScanSettings {
    /// Fails on timeouts that are negative, NaN or too large to represent.
    pub fn to_options(&self, roots: Vec<PathBuf>) -> anyhow::Result<ScanOptions> {
        let roots = if roots.is_empty() {
            self.roots.iter().map(PathBuf::from).collect()
        } else {
            roots
        };
        Ok(ScanOptions {
            roots,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            max_depth: self.max_depth,
            batch_size: self.batch_size,
            sample_bytes: self.sample_bytes,
            throttle_interval: Duration::from_millis(self.throttle_ms),
            overall_timeout: timeout("overall_timeout_secs", self.overall_timeout_secs)?,
            per_batch_timeout: timeout("per_batch_timeout_secs", self.per_batch_timeout_secs)?,
            follow_symlinks: self.follow_symlinks,
        })
    }
}

fn timeout(name: &str, secs: Option<f64>) -> anyhow::Result<Option<Duration>> {
    secs.map(|s| {
        Duration::try_from_secs_f64(s)
            .with_context(|| format!("invalid {name}: {s} is not a valid number of seconds"))
    })
    .transpose()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Move,
    Copy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    #[default]
    Version,
    Skip,
    Overwrite,
}

impl std::str::FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "move" => Ok(TransferMode::Move),
            "copy" => Ok(TransferMode::Copy),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "version" => Ok(ConflictPolicy::Version),
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeSettings {
    pub target_root: Option<String>,
    pub mode: TransferMode,
    #[serde(alias = "conflict_policy")]
    pub conflict: ConflictPolicy,
    #[serde(alias = "structure")]
    pub schema_paths: Vec<String>,
    pub rules_dir: Option<String>,
}

impl Default for OrganizeSettings {
    fn default() -> Self {
        Self {
            target_root: None,
            mode: TransferMode::default(),
            conflict: ConflictPolicy::default(),
            schema_paths: DEFAULT_SCHEMA_PATHS.iter().map(|s| s.to_string()).collect(),
            rules_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub provider: String,
    pub fallback: String,
    pub max_retries: u32,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            provider: "unified".to_string(),
            fallback: "unified".to_string(),
            max_retries: 2,
        }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
