//! Authenticated access to the cluster management control plane

use std::fmt;

use async_trait::async_trait;
use tracing::info;

use crate::azure::container_service::{ContainerServiceClient, ControlPlane, CredentialResult};
use crate::azure::credentials::{default_scope, DelegatedCredentials};
use crate::config::options::AzureOptions;
use crate::errors::StepError;
use crate::http::client::HttpClient;

/// Handle able to call the control plane for exactly one subscription
///
/// Holds a time-bounded token; it is never persisted and its `Debug`
/// output does not include credential material.
pub struct AuthenticatedClusterHandle {
    subscription_id: String,
    client: Box<dyn ControlPlane>,
}

impl AuthenticatedClusterHandle {
    /// Wrap a control plane client bound to a subscription
    pub fn new(subscription_id: impl Into<String>, client: Box<dyn ControlPlane>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            client,
        }
    }

    /// Get the subscription the handle is bound to
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// List the user credentials of a managed cluster
    pub async fn list_cluster_user_credentials(
        &self,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<Vec<CredentialResult>, StepError> {
        self.client
            .list_cluster_user_credentials(resource_group, cluster_name)
            .await
    }
}

impl fmt::Debug for AuthenticatedClusterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedClusterHandle")
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

/// Builds authenticated control plane handles
#[async_trait]
pub trait ControlPlaneConnector: Send + Sync {
    /// Authenticate and bind a control plane client to a subscription
    async fn connect(
        &self,
        credentials: DelegatedCredentials,
        subscription_id: String,
    ) -> Result<AuthenticatedClusterHandle, StepError>;
}

/// Connector for Azure Resource Manager
pub struct ArmConnector {
    http: HttpClient,
    options: AzureOptions,
}

impl ArmConnector {
    /// Create a new connector
    pub fn new(options: AzureOptions) -> Result<Self, StepError> {
        let http = HttpClient::new(options.http_timeout)?;
        Ok(Self { http, options })
    }
}

#[async_trait]
impl ControlPlaneConnector for ArmConnector {
    async fn connect(
        &self,
        credentials: DelegatedCredentials,
        subscription_id: String,
    ) -> Result<AuthenticatedClusterHandle, StepError> {
        let scope = default_scope(&self.options.resource_manager);
        let token = credentials
            .acquire_token(&self.http, &self.options.authority_host, &scope)
            .await?;
        info!("Authenticated with the control plane, token valid until {}", token.expires_at());

        let client = ContainerServiceClient::new(
            self.http.clone(),
            &self.options.resource_manager,
            &self.options.container_service_api_version,
            subscription_id.clone(),
            token,
        );

        Ok(AuthenticatedClusterHandle::new(subscription_id, Box::new(client)))
    }
}
