//! Project clustering providers.
//!
//! A clusterer only ever sees safe ids and lean metadata, never real paths.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod by_bucket;
pub mod noop;
pub mod unified;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// The provider cannot serve this request; retrying will not help.
    #[error("fatal: {0}")]
    Fatal(String),
    /// Transient failure (rate limit, timeout, 5xx).
    #[error("retryable: {0}")]
    Retryable(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl ClusterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClusterError::Retryable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeanDoc {
    pub safe_id: String,
    pub name: String,
    pub ext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCluster {
    #[serde(alias = "project_id")]
    pub project_label: String,
    pub doc_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub projects: Vec<ProjectCluster>,
}

#[async_trait::async_trait]
pub trait ProjectClusterer: Send + Sync {
    async fn cluster(&self, docs: &[LeanDoc]) -> Result<ClusterResponse, ClusterError>;
}

#[derive(Default, Clone)]
pub struct ClustererRegistry {
    clusterers: HashMap<String, Arc<dyn ProjectClusterer>>,
    pub preferred: Option<String>,
}

impl ClustererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in clusterer, preferring `unified`.
    pub fn with_builtins() -> Self {
        Self::new()
            .with_clusterer("noop", Arc::new(noop::NoopClusterer))
            .with_clusterer("unified", Arc::new(unified::UnifiedClusterer::default()))
            .with_clusterer("by_bucket", Arc::new(by_bucket::BucketClusterer))
            .set_preferred("unified")
    }

    pub fn with_clusterer(mut self, name: &str, clusterer: Arc<dyn ProjectClusterer>) -> Self {
        self.clusterers.insert(name.to_string(), clusterer);
        self
    }

    pub fn set_preferred(mut self, name: &str) -> Self {
        self.preferred = Some(name.to_string());
        self
    }

    pub fn clusterer(&self, name: Option<&str>) -> Result<Arc<dyn ProjectClusterer>, ClusterError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred.clone())
            .ok_or_else(|| ClusterError::UnknownProvider("no clusterer configured".into()))?;
        self.clusterers
            .get(&key)
            .cloned()
            .ok_or(ClusterError::UnknownProvider(key))
    }
}
