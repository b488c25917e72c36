//! Credential resolution for the control plane

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::azure::connector::{AuthenticatedClusterHandle, ControlPlaneConnector};
use crate::azure::credentials::DelegatedCredentials;
use crate::errors::StepError;
use crate::secrets::store::SecretBinding;

/// Vault secret holding the service principal's application id
pub const CLIENT_ID_SECRET: &str = "azure-sp-client-id";

/// Vault secret holding the service principal's client secret
pub const CLIENT_SECRET_SECRET: &str = "azure-sp-client-secret";

/// Vault secret holding the tenant id
pub const TENANT_ID_SECRET: &str = "azure-tenant-id";

/// Vault secret holding the subscription id
pub const SUBSCRIPTION_ID_SECRET: &str = "subscription-id";

/// Read the delegated identity credentials from the vault
pub async fn get_delegated_credentials(
    binding: &SecretBinding,
) -> Result<DelegatedCredentials, StepError> {
    let client_id = plain_secret(binding, CLIENT_ID_SECRET).await?;
    let client_secret = binding.get_secret(CLIENT_SECRET_SECRET).await?;
    let tenant_id = plain_secret(binding, TENANT_ID_SECRET).await?;

    if client_secret.expose_secret().is_empty() {
        return Err(StepError::Auth(format!(
            "Secret {} in vault {} is empty",
            CLIENT_SECRET_SECRET, binding.vault_name
        )));
    }

    Ok(DelegatedCredentials::new(tenant_id, client_id, client_secret))
}

/// Read the subscription id from the vault
pub async fn get_subscription_id(binding: &SecretBinding) -> Result<String, StepError> {
    plain_secret(binding, SUBSCRIPTION_ID_SECRET).await
}

/// Non-sensitive identifiers stored next to the credentials
async fn plain_secret(binding: &SecretBinding, name: &str) -> Result<String, StepError> {
    let value: SecretString = binding.get_secret(name).await?;
    let value = value.expose_secret().trim().to_string();
    if value.is_empty() {
        return Err(StepError::Auth(format!(
            "Secret {} in vault {} is empty",
            name, binding.vault_name
        )));
    }
    Ok(value)
}

/// Resolve credentials and the subscription, then authenticate with the control plane
pub async fn resolve(
    binding: &SecretBinding,
    connector: &dyn ControlPlaneConnector,
) -> Result<AuthenticatedClusterHandle, StepError> {
    info!("Resolving cluster credentials from vault {}", binding.vault_name);

    let credentials = get_delegated_credentials(binding).await?;
    let subscription_id = get_subscription_id(binding).await?;
    let handle = connector.connect(credentials, subscription_id).await?;

    info!(
        "Control plane client bound to subscription {}",
        handle.subscription_id()
    );
    Ok(handle)
}
