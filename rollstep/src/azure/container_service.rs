//! Managed cluster operations of the Azure container service

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::azure::token::AccessToken;
use crate::errors::StepError;
use crate::http::client::{error_message, HttpClient};

/// A kubeconfig returned by the control plane
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialResult {
    /// Credential name, e.g. `clusterUser`
    pub name: String,

    /// Raw kubeconfig bytes
    pub value: Vec<u8>,
}

impl std::fmt::Debug for CredentialResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResult")
            .field("name", &self.name)
            .field("value", &format_args!("[{} bytes]", self.value.len()))
            .finish()
    }
}

/// Control plane operations used by the step
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List the user credentials of a managed cluster
    async fn list_cluster_user_credentials(
        &self,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<Vec<CredentialResult>, StepError>;
}

/// Azure Resource Manager client for managed clusters of one subscription
pub struct ContainerServiceClient {
    http: HttpClient,
    resource_manager: String,
    api_version: String,
    subscription_id: String,
    token: AccessToken,
}

impl ContainerServiceClient {
    /// Create a new client bound to a subscription
    pub fn new(
        http: HttpClient,
        resource_manager: &str,
        api_version: &str,
        subscription_id: String,
        token: AccessToken,
    ) -> Self {
        Self {
            http,
            resource_manager: resource_manager.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            subscription_id,
            token,
        }
    }

    fn list_credentials_url(
        &self,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<Url, StepError> {
        list_credentials_url(
            &self.resource_manager,
            &self.api_version,
            &self.subscription_id,
            resource_group,
            cluster_name,
        )
    }
}

#[async_trait]
impl ControlPlane for ContainerServiceClient {
    async fn list_cluster_user_credentials(
        &self,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<Vec<CredentialResult>, StepError> {
        check_token(&self.token)?;

        let url = self.list_credentials_url(resource_group, cluster_name)?;
        let reply = self
            .http
            .post(&url, self.token.secret())
            .await
            .map_err(|e| match e {
                StepError::Http(e) => StepError::ControlPlane(e.to_string()),
                other => other,
            })?;

        if !reply.is_success() {
            let message = error_message(&reply);
            error!("Listing cluster credentials failed: {}", message);
            return Err(StepError::ControlPlane(message));
        }

        let results = decode_credential_results(&reply.body)?;
        debug!(
            "Control plane returned {} credential(s) for {}",
            results.len(),
            cluster_name
        );
        Ok(results)
    }
}

fn check_token(token: &AccessToken) -> Result<(), StepError> {
    if token.is_expired() {
        return Err(StepError::Auth(format!(
            "Control plane token expired at {}",
            token.expires_at()
        )));
    }
    Ok(())
}

/// Build the `listClusterUserCredential` URL
pub fn list_credentials_url(
    resource_manager: &str,
    api_version: &str,
    subscription_id: &str,
    resource_group: &str,
    cluster_name: &str,
) -> Result<Url, StepError> {
    let mut url = Url::parse(resource_manager).map_err(|e| {
        StepError::Config(format!("Invalid resource manager {}: {}", resource_manager, e))
    })?;
    url.path_segments_mut()
        .map_err(|_| StepError::Config(format!("Invalid resource manager {}", resource_manager)))?
        .pop_if_empty()
        .extend([
            "subscriptions",
            subscription_id,
            "resourceGroups",
            resource_group,
            "providers",
            "Microsoft.ContainerService",
            "managedClusters",
            cluster_name,
            "listClusterUserCredential",
        ]);
    url.query_pairs_mut().append_pair("api-version", api_version);
    Ok(url)
}

#[derive(Deserialize)]
struct CredentialResults {
    #[serde(default)]
    kubeconfigs: Vec<RawCredentialResult>,
}

#[derive(Deserialize)]
struct RawCredentialResult {
    #[serde(default)]
    name: String,
    value: String,
}

/// Decode a `CredentialResults` body, the kubeconfig values are base64
pub fn decode_credential_results(body: &str) -> Result<Vec<CredentialResult>, StepError> {
    let results: CredentialResults = serde_json::from_str(body)
        .map_err(|e| StepError::ControlPlane(format!("Malformed credential results: {}", e)))?;

    results
        .kubeconfigs
        .into_iter()
        .map(|raw| {
            let value = STANDARD.decode(raw.value.as_bytes()).map_err(|e| {
                StepError::Decode(format!("Credential {} is not valid base64: {}", raw.name, e))
            })?;
            Ok(CredentialResult {
                name: raw.name,
                value,
            })
        })
        .collect()
}
