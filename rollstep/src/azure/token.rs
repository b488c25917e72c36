//! Access token management

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::Deserialize;

use crate::errors::StepError;

/// Seconds before expiry after which a token is no longer used
const EXPIRY_SKEW_SECS: i64 = 60;

/// A bearer token for an Azure resource
#[derive(Clone)]
pub struct AccessToken {
    secret: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token valid for `expires_in` seconds from now
    pub fn new(secret: SecretString, expires_in: i64) -> Result<Self, StepError> {
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(invalid_expiry)?;

        Ok(Self { secret, expires_at })
    }

    /// Get the raw token
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Get expiration time
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token expires within the given number of seconds
    pub fn expires_within(&self, seconds: i64) -> bool {
        match Duration::try_seconds(seconds).and_then(|d| Utc::now().checked_add_signed(d)) {
            Some(deadline) => self.expires_at <= deadline,
            None => true,
        }
    }

    /// Check if the token can no longer be used at all
    pub fn is_expired(&self) -> bool {
        self.expires_within(0)
    }

    /// Check if a cached token should be refreshed before reuse
    pub fn needs_refresh(&self) -> bool {
        self.expires_within(EXPIRY_SKEW_SECS)
    }

    /// Build a token from an OAuth2 token endpoint response
    pub fn from_response(body: &str) -> Result<Self, StepError> {
        let response: TokenResponse = serde_json::from_str(body)
            .map_err(|e| StepError::Auth(format!("Malformed token response: {}", e)))?;

        // The v1 endpoint reports expires_in as a string
        let expires_in = match &response.expires_in {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .filter(|secs| *secs >= 0)
        .ok_or_else(invalid_expiry)?;

        Self::new(SecretString::from(response.access_token), expires_in)
    }
}

fn invalid_expiry() -> StepError {
    StepError::Auth("Token response has no valid expires_in".to_string())
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: serde_json::Value,
}
