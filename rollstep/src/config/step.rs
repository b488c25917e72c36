//! Step configuration document

use serde::{Deserialize, Serialize};

use crate::errors::StepError;
use crate::filesys::file::File;
use crate::models::target::DeploymentTarget;

/// Task discriminator for this step
pub const TASK_NAME: &str = "k8sImageRollingUpdate";

/// Placeholder substituted by the stage name in naming conventions
pub const ENV_PLACEHOLDER: &str = "{env}";

/// Configuration of the rolling update step
///
/// Unknown keys in the document are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Task discriminator, must be `k8sImageRollingUpdate`
    pub task: String,

    /// Resource group of the managed cluster
    pub resource_group: String,

    /// Managed cluster name
    pub cluster_name: String,

    /// Deployment to update
    pub deployment_name: String,

    /// Image repository, the artifact tag is appended at run time
    pub image: String,

    /// Kubernetes namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Deploy on every run instead of only on release tags
    #[serde(default)]
    pub always_deploy: bool,

    /// Azure naming conventions
    pub azure: AzureNaming,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Naming conventions parameterized by environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureNaming {
    /// Naming convention for the cluster, e.g. `aks_{env}`
    pub kubernetes_naming: String,

    /// Naming convention for the key vault holding the credentials
    #[serde(default = "default_keyvault_naming")]
    pub keyvault_naming: String,
}

fn default_keyvault_naming() -> String {
    "keyvault{env}".to_string()
}

impl AzureNaming {
    /// Cluster name for the given stage
    pub fn kubernetes_name(&self, stage: &str) -> String {
        self.kubernetes_naming.replace(ENV_PLACEHOLDER, stage)
    }

    /// Key vault name for the given stage
    pub fn keyvault_name(&self, stage: &str) -> String {
        self.keyvault_naming.replace(ENV_PLACEHOLDER, stage)
    }
}

impl StepConfig {
    /// Parse and validate a configuration document
    pub fn from_json(contents: &str) -> Result<Self, StepError> {
        let config: StepConfig = serde_json::from_str(contents)
            .map_err(|e| StepError::Config(format!("Invalid step configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub async fn load(file: &File) -> Result<Self, StepError> {
        if !file.exists().await {
            return Err(StepError::Config(format!(
                "Configuration file does not exist: {}",
                file.path().display()
            )));
        }
        let contents = file.read_string().await.map_err(|e| {
            StepError::Config(format!("Failed to read {}: {}", file.path().display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), StepError> {
        if self.task != TASK_NAME {
            return Err(StepError::Config(format!(
                "Unexpected task '{}', expected '{}'",
                self.task, TASK_NAME
            )));
        }

        let required = [
            ("resource_group", &self.resource_group),
            ("cluster_name", &self.cluster_name),
            ("deployment_name", &self.deployment_name),
            ("image", &self.image),
            ("namespace", &self.namespace),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(StepError::Config(format!("'{}' must not be empty", key)));
            }
        }

        // The artifact tag is always appended, a tag in the repository would be overridden
        if self.image.rsplit('/').next().is_some_and(|last| last.contains(':')) {
            return Err(StepError::Config(format!(
                "'image' must not contain a tag: {}",
                self.image
            )));
        }

        for (key, value) in [
            ("azure.kubernetes_naming", &self.azure.kubernetes_naming),
            ("azure.keyvault_naming", &self.azure.keyvault_naming),
        ] {
            if !value.contains(ENV_PLACEHOLDER) {
                return Err(StepError::Config(format!(
                    "'{}' must contain the {} parameter, e.g. aks_{}",
                    key, ENV_PLACEHOLDER, ENV_PLACEHOLDER
                )));
            }
        }

        Ok(())
    }

    /// The deployment targeted by this configuration
    pub fn target(&self) -> DeploymentTarget {
        DeploymentTarget {
            resource_group: self.resource_group.clone(),
            cluster_name: self.cluster_name.clone(),
            namespace: self.namespace.clone(),
            deployment_name: self.deployment_name.clone(),
            image_repository: self.image.clone(),
        }
    }
}
