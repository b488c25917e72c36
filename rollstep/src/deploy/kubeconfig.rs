//! Cluster access configuration (kubeconfig) materialization

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::azure::connector::AuthenticatedClusterHandle;
use crate::azure::container_service::CredentialResult;
use crate::errors::StepError;
use crate::models::target::DeploymentTarget;
use crate::storage::layout::StorageLayout;

/// Environment variable through which kubectl locates its configuration
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Location of the kubeconfig written for this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAccessConfig {
    path: PathBuf,
}

impl ClusterAccessConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the kubeconfig path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Environment handed to kubectl so it loads this configuration
    pub fn env(&self) -> Vec<(String, String)> {
        vec![(
            KUBECONFIG_ENV.to_string(),
            self.path.display().to_string(),
        )]
    }
}

/// Select the first credential, the list must not be empty
pub fn select_credential<'a>(
    results: &'a [CredentialResult],
    cluster_name: &str,
) -> Result<&'a CredentialResult, StepError> {
    results.first().ok_or_else(|| StepError::EmptyCredentials {
        cluster: cluster_name.to_string(),
    })
}

/// Decode a credential as UTF-8 kubeconfig text
pub fn decode_kubeconfig(credential: &CredentialResult) -> Result<String, StepError> {
    String::from_utf8(credential.value.clone()).map_err(|e| {
        StepError::Decode(format!(
            "Kubeconfig {} is not valid UTF-8: {}",
            credential.name, e
        ))
    })
}

/// Write the kubeconfig to `~/.kube/config`
///
/// The `.kube` directory must not exist: one run per process or container
/// is assumed, and an existing configuration is never merged or replaced.
pub async fn write_kubeconfig(
    layout: &StorageLayout,
    kubeconfig: &str,
) -> Result<ClusterAccessConfig, StepError> {
    let kube_dir = layout.kube_dir();
    if kube_dir.exists().await || layout.kubeconfig_file().exists().await {
        error!(
            "Refusing to overwrite existing kubeconfig directory {}",
            kube_dir.path().display()
        );
        return Err(StepError::KubeconfigExists {
            path: kube_dir.path().display().to_string(),
        });
    }

    kube_dir.create_new().await.map_err(|e| match e {
        StepError::Io(io) if io.kind() == std::io::ErrorKind::AlreadyExists => {
            StepError::KubeconfigExists {
                path: kube_dir.path().display().to_string(),
            }
        }
        other => other,
    })?;

    let file = layout.kubeconfig_file();
    file.write_new(kubeconfig).await?;
    file.set_permissions_600().await?;

    info!("Kubeconfig successfully written to {}", file.path().display());
    Ok(ClusterAccessConfig::new(file.path()))
}

/// Fetch the cluster user credentials and persist them as kubeconfig
pub async fn materialize(
    handle: &AuthenticatedClusterHandle,
    target: &DeploymentTarget,
    layout: &StorageLayout,
) -> Result<ClusterAccessConfig, StepError> {
    info!(
        "Fetching user credentials for cluster {} in {}",
        target.cluster_name, target.resource_group
    );

    let results = handle
        .list_cluster_user_credentials(&target.resource_group, &target.cluster_name)
        .await?;
    let credential = select_credential(&results, &target.cluster_name)?;
    let kubeconfig = decode_kubeconfig(credential)?;

    write_kubeconfig(layout, &kubeconfig).await
}
