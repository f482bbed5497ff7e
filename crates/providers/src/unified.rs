use crate::{ClusterError, ClusterResponse, LeanDoc, ProjectCluster, ProjectClusterer};

pub const UNIFIED_LABEL: &str = "unified_project";

/// Puts every document into a single project.
#[derive(Debug, Clone)]
pub struct UnifiedClusterer {
    pub label: String,
}

impl Default for UnifiedClusterer {
    fn default() -> Self {
        Self {
            label: UNIFIED_LABEL.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ProjectClusterer for UnifiedClusterer {
    async fn cluster(&self, docs: &[LeanDoc]) -> Result<ClusterResponse, ClusterError> {
        if docs.is_empty() {
            return Ok(ClusterResponse::default());
        }
        Ok(ClusterResponse {
            projects: vec![ProjectCluster {
                project_label: self.label.clone(),
                doc_ids: docs.iter().map(|d| d.safe_id.clone()).collect(),
            }],
        })
    }
}
