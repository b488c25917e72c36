//! Azure Key Vault secret store

use std::future::Future;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use url::Url;

use crate::azure::credentials::{default_scope, DelegatedCredentials};
use crate::azure::token::AccessToken;
use crate::config::options::KeyVaultOptions;
use crate::errors::StepError;
use crate::http::client::{error_message, HttpClient, HttpReply};
use crate::secrets::store::SecretStore;
use crate::utils::calc_exp_backoff;

/// Prefix of the variables holding the vault client's service principal
pub const VAULT_CREDENTIALS_PREFIX: &str = "AZURE_KEYVAULT_SP";

/// Key Vault client authenticated with a service principal
pub struct KeyVaultClient {
    vault_name: String,
    vault_url: Url,
    credentials: DelegatedCredentials,
    options: KeyVaultOptions,
    http: HttpClient,
    authority_host: String,
    cached_token: RwLock<Option<AccessToken>>,
}

impl KeyVaultClient {
    /// Create a new client for the named vault
    pub fn new(
        vault_name: &str,
        credentials: DelegatedCredentials,
        options: KeyVaultOptions,
        http_timeout: std::time::Duration,
    ) -> Result<Self, StepError> {
        let vault_url = vault_url(vault_name, &options.dns_suffix)?;
        let http = HttpClient::new(http_timeout)?;

        Ok(Self {
            vault_name: vault_name.to_string(),
            vault_url,
            credentials,
            options,
            http,
            authority_host: "https://login.microsoftonline.com".to_string(),
            cached_token: RwLock::new(None),
        })
    }

    /// Use a different Entra ID authority host
    pub fn with_authority_host(mut self, authority_host: &str) -> Self {
        self.authority_host = authority_host.trim_end_matches('/').to_string();
        self
    }

    async fn token(&self) -> Result<AccessToken, StepError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.needs_refresh()) {
                return Ok(token.clone());
            }
        }

        let scope = default_scope(&format!("https://{}", self.options.dns_suffix));
        let token = self
            .credentials
            .acquire_token(&self.http, &self.authority_host, &scope)
            .await?;

        let mut cached = self.cached_token.write().await;
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn fetch(&self, url: &Url) -> Result<HttpReply, StepError> {
        let token = self.token().await?;
        fetch_with_retry(&self.options, &self.vault_name, || {
            self.http.get(url, token.secret())
        })
        .await
    }
}

/// Send a vault request, retrying throttled, failed and timed out attempts
async fn fetch_with_retry<F, Fut>(
    options: &KeyVaultOptions,
    vault_name: &str,
    mut send: F,
) -> Result<HttpReply, StepError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<HttpReply, StepError>>,
{
    let mut attempt = 0;

    loop {
        let result = send().await;
        let retryable = match &result {
            Ok(reply) => is_retryable(reply.status),
            Err(StepError::Http(e)) => e.is_timeout() || e.is_connect(),
            Err(_) => false,
        };

        attempt += 1;
        if !retryable || attempt >= options.max_attempts {
            return result;
        }

        let delay = calc_exp_backoff(&options.cooldown, attempt - 1);
        warn!(
            "Key vault request to {} failed (attempt {}/{}), retrying in {:?}",
            vault_name, attempt, options.max_attempts, delay
        );
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl SecretStore for KeyVaultClient {
    async fn get_secret(&self, name: &str) -> Result<SecretString, StepError> {
        let url = secret_url(&self.vault_url, name, &self.options.api_version)?;
        debug!("Fetching secret {} from vault {}", name, self.vault_name);

        let reply = self.fetch(&url).await.map_err(|e| match e {
            StepError::Http(e) => StepError::Auth(format!("Key vault request failed: {}", e)),
            other => other,
        })?;

        secret_from_reply(&reply, &self.vault_name, name)
    }
}

/// Map a secret read reply to the secret value or a typed error
fn secret_from_reply(
    reply: &HttpReply,
    vault_name: &str,
    name: &str,
) -> Result<SecretString, StepError> {
    match reply.status {
        status if status.is_success() => {
            let bundle: SecretBundle = reply.json().map_err(|e| {
                StepError::Auth(format!("Malformed secret bundle for {}: {}", name, e))
            })?;
            Ok(SecretString::from(bundle.value))
        }
        StatusCode::NOT_FOUND => Err(StepError::SecretNotFound {
            vault: vault_name.to_string(),
            name: name.to_string(),
        }),
        _ => {
            let message = error_message(reply);
            error!("Reading secret {} failed: {}", name, message);
            Err(StepError::Auth(format!(
                "Reading secret {} from {} failed: {}",
                name, vault_name, message
            )))
        }
    }
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Vault names only allow alphanumerics and dashes
pub fn normalize_secret_name(name: &str) -> String {
    name.replace('_', "-")
}

fn vault_url(vault_name: &str, dns_suffix: &str) -> Result<Url, StepError> {
    if vault_name.is_empty() || !vault_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(StepError::Config(format!("Invalid key vault name: {}", vault_name)));
    }
    Url::parse(&format!("https://{}.{}/", vault_name, dns_suffix))
        .map_err(|e| StepError::Config(format!("Invalid key vault url: {}", e)))
}

fn secret_url(vault_url: &Url, name: &str, api_version: &str) -> Result<Url, StepError> {
    let name = normalize_secret_name(name);
    let mut url = vault_url.clone();
    url.path_segments_mut()
        .map_err(|_| StepError::Config(format!("Invalid key vault url: {}", vault_url)))?
        .pop_if_empty()
        .extend(["secrets", name.as_str()]);
    url.query_pairs_mut().append_pair("api-version", api_version);
    Ok(url)
}
