//! Runtime options of the step

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::utils::CooldownOptions;

/// Main step options
#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Program used for the rolling update
    pub kubectl: String,

    /// Azure endpoints and API versions
    pub azure: AzureOptions,

    /// Key vault client options
    pub keyvault: KeyVaultOptions,

    /// Filesystem layout (home directory holding `.kube`)
    pub layout: StorageLayout,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            azure: AzureOptions::default(),
            keyvault: KeyVaultOptions::default(),
            layout: StorageLayout::default(),
        }
    }
}

impl StepOptions {
    /// Default options with overrides taken from the process environment
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Some(kubectl) = non_empty_var("ROLLSTEP_KUBECTL") {
            options.kubectl = kubectl;
        }
        if let Some(authority) = non_empty_var("AZURE_AUTHORITY_HOST") {
            options.azure.authority_host = authority.trim_end_matches('/').to_string();
        }
        if let Some(arm) = non_empty_var("AZURE_RESOURCE_MANAGER") {
            options.azure.resource_manager = arm.trim_end_matches('/').to_string();
        }

        options
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Azure control plane options
#[derive(Debug, Clone)]
pub struct AzureOptions {
    /// Entra ID authority host
    pub authority_host: String,

    /// Azure Resource Manager endpoint
    pub resource_manager: String,

    /// API version of the container service provider
    pub container_service_api_version: String,

    /// Timeout of a single HTTP request
    pub http_timeout: Duration,
}

impl Default for AzureOptions {
    fn default() -> Self {
        Self {
            authority_host: "https://login.microsoftonline.com".to_string(),
            resource_manager: "https://management.azure.com".to_string(),
            container_service_api_version: "2024-05-01".to_string(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// Key vault client options
#[derive(Debug, Clone)]
pub struct KeyVaultOptions {
    /// DNS suffix of vault endpoints
    pub dns_suffix: String,

    /// Key vault data plane API version
    pub api_version: String,

    /// Number of attempts for throttled or failed requests
    pub max_attempts: u32,

    /// Backoff between attempts
    pub cooldown: CooldownOptions,
}

impl Default for KeyVaultOptions {
    fn default() -> Self {
        Self {
            dns_suffix: "vault.azure.net".to_string(),
            api_version: "7.4".to_string(),
            max_attempts: 3,
            cooldown: CooldownOptions {
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(10),
                multiplier: 2.0,
            },
        }
    }
}
