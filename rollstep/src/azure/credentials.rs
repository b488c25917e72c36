//! Service principal credentials

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error};
use url::Url;

use crate::azure::token::AccessToken;
use crate::errors::StepError;
use crate::http::client::{error_message, HttpClient};

/// Delegated identity credentials of a service principal
#[derive(Clone)]
pub struct DelegatedCredentials {
    /// Directory (tenant) id
    pub tenant_id: String,

    /// Application (client) id
    pub client_id: String,

    /// Client secret
    pub client_secret: SecretString,
}

impl DelegatedCredentials {
    /// Create a new set of credentials
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// Read credentials from variables namespaced by stage,
    /// e.g. `{prefix}_CLIENT_ID_DEV`
    pub fn from_lookup<F>(prefix: &str, stage: &str, lookup: F) -> Result<Self, StepError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let suffix = stage.to_uppercase();
        let read = |field: &str| {
            let key = format!("{}_{}_{}", prefix, field, suffix);
            lookup(&key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StepError::Auth(format!("Missing credential variable {}", key)))
        };

        Ok(Self {
            tenant_id: read("TENANT")?,
            client_id: read("CLIENT_ID")?,
            client_secret: SecretString::from(read("CLIENT_SECRET")?),
        })
    }

    /// Read credentials from the process environment
    pub fn from_env(prefix: &str, stage: &str) -> Result<Self, StepError> {
        Self::from_lookup(prefix, stage, |key| std::env::var(key).ok())
    }

    /// Exchange the credentials for an access token (client credentials flow)
    pub async fn acquire_token(
        &self,
        http: &HttpClient,
        authority_host: &str,
        scope: &str,
    ) -> Result<AccessToken, StepError> {
        let url = token_url(authority_host, &self.tenant_id)?;
        debug!("Requesting token for client {} and scope {}", self.client_id, scope);

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("scope", scope),
        ];
        let reply = http.post_form(&url, &form).await.map_err(|e| match e {
            StepError::Http(e) => StepError::Auth(format!("Token request failed: {}", e)),
            other => other,
        })?;

        if !reply.is_success() {
            let message = error_message(&reply);
            error!("Token request failed: {}", message);
            return Err(StepError::Auth(format!("Token request failed: {}", message)));
        }

        AccessToken::from_response(&reply.body)
    }
}

impl fmt::Debug for DelegatedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

fn token_url(authority_host: &str, tenant_id: &str) -> Result<Url, StepError> {
    let mut url = Url::parse(authority_host)
        .map_err(|e| StepError::Config(format!("Invalid authority host {}: {}", authority_host, e)))?;
    url.path_segments_mut()
        .map_err(|_| StepError::Config(format!("Invalid authority host {}", authority_host)))?
        .pop_if_empty()
        .extend([tenant_id, "oauth2", "v2.0", "token"]);
    Ok(url)
}

/// Scope requesting the default permissions of a resource
pub fn default_scope(resource: &str) -> String {
    format!("{}/.default", resource.trim_end_matches('/'))
}
