//! Secret store abstraction and the per-run vault binding

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::info;

use crate::azure::credentials::DelegatedCredentials;
use crate::config::options::StepOptions;
use crate::config::step::StepConfig;
use crate::errors::StepError;
use crate::models::version::ApplicationVersion;
use crate::secrets::keyvault::{KeyVaultClient, VAULT_CREDENTIALS_PREFIX};

/// Secret store trait for testability
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get a secret by name, `SecretNotFound` if it does not exist
    async fn get_secret(&self, name: &str) -> Result<SecretString, StepError>;
}

/// A secret store bound to a named vault
#[derive(Clone)]
pub struct SecretBinding {
    /// Name of the vault
    pub vault_name: String,

    /// Client of the vault
    pub store: Arc<dyn SecretStore>,
}

impl SecretBinding {
    /// Create a new binding
    pub fn new(vault_name: impl Into<String>, store: Arc<dyn SecretStore>) -> Self {
        Self {
            vault_name: vault_name.into(),
            store,
        }
    }

    /// Get a secret from the bound vault
    pub async fn get_secret(&self, name: &str) -> Result<SecretString, StepError> {
        self.store.get_secret(name).await
    }
}

impl std::fmt::Debug for SecretBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBinding")
            .field("vault_name", &self.vault_name)
            .finish_non_exhaustive()
    }
}

/// Name of the vault holding the credentials of a stage
pub fn vault_name(config: &StepConfig, env: &ApplicationVersion) -> String {
    config.azure.keyvault_name(&env.stage())
}

/// Bind a Key Vault client to the vault of the run's stage
///
/// The vault client authenticates with a service principal read from the
/// process environment, namespaced by stage.
pub fn resolve_vault_and_client(
    config: &StepConfig,
    env: &ApplicationVersion,
    options: &StepOptions,
) -> Result<SecretBinding, StepError> {
    let vault_name = vault_name(config, env);
    let credentials = DelegatedCredentials::from_env(VAULT_CREDENTIALS_PREFIX, &env.stage())?;
    let client = KeyVaultClient::new(
        &vault_name,
        credentials,
        options.keyvault.clone(),
        options.azure.http_timeout,
    )?
    .with_authority_host(&options.azure.authority_host);

    info!("Using key vault {}", vault_name);
    Ok(SecretBinding::new(vault_name, Arc::new(client)))
}
