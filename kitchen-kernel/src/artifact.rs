use crate::models::{Artifact, Version};
use parking_lot::RwLock;
use std::sync::Arc;

/// Latest published artifact. Readers get a cheap snapshot; the pipeline
/// publishes by swapping the whole `Arc`.
#[derive(Clone)]
pub struct ArtifactStore {
    current: Arc<RwLock<Arc<Artifact>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self { current: Arc::new(RwLock::new(Arc::new(Artifact::empty()))) }
    }

    pub fn snapshot(&self) -> Arc<Artifact> {
        self.current.read().clone()
    }

    pub fn published_version(&self) -> Version {
        self.current.read().version
    }

    /// Replaces the artifact unless it would move the published version backwards.
    pub fn publish(&self, artifact: Artifact) -> bool {
        let mut current = self.current.write();
        if artifact.version < current.version {
            tracing::warn!(
                stale = %artifact.version.to_epoch_string(),
                published = %current.version.to_epoch_string(),
                "refusing to publish an older artifact"
            );
            return false;
        }
        *current = Arc::new(artifact);
        true
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}
