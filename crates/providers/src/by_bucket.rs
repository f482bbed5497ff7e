use crate::{ClusterError, ClusterResponse, LeanDoc, ProjectCluster, ProjectClusterer};
use std::collections::BTreeMap;

/// One project per bucket label; unlabeled documents go to `misc`.
#[derive(Debug, Default)]
pub struct BucketClusterer;

#[async_trait::async_trait]
impl ProjectClusterer for BucketClusterer {
    async fn cluster(&self, docs: &[LeanDoc]) -> Result<ClusterResponse, ClusterError> {
        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for doc in docs {
            let label = doc.bucket.as_deref().unwrap_or("misc");
            groups.entry(label).or_default().push(doc.safe_id.clone());
        }
        Ok(ClusterResponse {
            projects: groups
                .into_iter()
                .map(|(label, doc_ids)| ProjectCluster {
                    project_label: label.to_string(),
                    doc_ids,
                })
                .collect(),
        })
    }
}
