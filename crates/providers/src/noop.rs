use crate::{ClusterError, ClusterResponse, LeanDoc, ProjectClusterer};

#[derive(Debug, Default)]
pub struct NoopClusterer;

#[async_trait::async_trait]
impl ProjectClusterer for NoopClusterer {
    async fn cluster(&self, _docs: &[LeanDoc]) -> Result<ClusterResponse, ClusterError> {
        Err(ClusterError::Fatal("not implemented".to_string()))
    }
}
