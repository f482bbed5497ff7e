//! Glue between scanned records and the external project clusterer.

use crate::models::{FileRecord, ProjectGroup};
use crate::safe_map::SafeMap;
use providers::{ClusterError, ClusterResponse, LeanDoc, ProjectClusterer};
use std::time::Duration;
use tracing::{info, warn};

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

pub fn lean_docs(records: &[FileRecord]) -> Vec<LeanDoc> {
    records
        .iter()
        .filter(|r| r.error.is_none())
        .map(|r| LeanDoc {
            safe_id: r.safe_id.clone(),
            name: r.name.clone(),
            ext: r.ext.clone(),
            bucket: r.bucket.clone(),
            size: r.size,
        })
        .collect()
}

/// Runs `primary`, retrying retryable failures up to `max_retries` times.
/// A fatal failure or exhausted retries hands the request to `fallback`;
/// the fallback's own failure is returned as is.
pub async fn cluster_with_fallback(
    primary: &dyn ProjectClusterer,
    fallback: Option<&dyn ProjectClusterer>,
    docs: &[LeanDoc],
    max_retries: u32,
) -> Result<ClusterResponse, ClusterError> {
    let mut attempt = 0u32;
    let err = loop {
        match primary.cluster(docs).await {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                warn!("Clusterer failed ({}), retry {}/{}", e, attempt, max_retries);
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(e) => break e,
        }
    };
    match fallback {
        Some(fb) => {
            warn!("Primary clusterer gave up ({}), using fallback", err);
            fb.cluster(docs).await
        }
        None => Err(err),
    }
}

/// Maps clusterer output back to real paths. Unknown ids are dropped.
pub fn resolve_projects(response: &ClusterResponse, safe_map: &SafeMap) -> Vec<ProjectGroup> {
    let mut groups = Vec::with_capacity(response.projects.len());
    for project in &response.projects {
        let mut paths = Vec::with_capacity(project.doc_ids.len());
        for id in &project.doc_ids {
            match safe_map.resolve(id) {
                Some(p) => paths.push(p.to_path_buf()),
                None => warn!(
                    "Project {:?} references unknown safe id {}",
                    project.project_label, id
                ),
            }
        }
        groups.push(ProjectGroup {
            label: project.project_label.clone(),
            paths,
        });
    }
    info!("Resolved {} project group(s)", groups.len());
    groups
}
