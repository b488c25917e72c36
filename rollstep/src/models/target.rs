//! Deployment target and image reference

use std::fmt;

use serde::{Deserialize, Serialize};

/// The single deployment updated by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    /// Azure resource group holding the managed cluster
    pub resource_group: String,

    /// Managed cluster name
    pub cluster_name: String,

    /// Kubernetes namespace of the deployment
    pub namespace: String,

    /// Deployment name, also used as the container name
    pub deployment_name: String,

    /// Image repository without tag
    pub image_repository: String,
}

impl DeploymentTarget {
    /// Image reference for the given artifact tag
    pub fn image_reference(&self, artifact_tag: &str) -> ImageReference {
        ImageReference::compose(&self.image_repository, artifact_tag)
    }
}

/// Fully qualified `{repository}:{tag}` image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Compose a reference from a repository and an artifact tag
    pub fn compose(repository: &str, tag: &str) -> Self {
        Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
