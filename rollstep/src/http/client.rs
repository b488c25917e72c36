//! HTTP client implementation

use reqwest::{header, Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::errors::StepError;
use crate::utils::generate_request_id;

/// Header carrying the client request id for Azure diagnostics
const CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: String,
}

impl HttpReply {
    /// Check if the request succeeded
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, StepError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP client for the Azure endpoints
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: std::time::Duration) -> Result<Self, StepError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Make an authenticated GET request
    pub async fn get(&self, url: &Url, token: &SecretString) -> Result<HttpReply, StepError> {
        debug!("GET {}", url);
        let request = self
            .client
            .get(url.clone())
            .header(header::AUTHORIZATION, bearer(token));
        self.send(request).await
    }

    /// Make an authenticated POST request without a body
    pub async fn post(&self, url: &Url, token: &SecretString) -> Result<HttpReply, StepError> {
        debug!("POST {}", url);
        let request = self
            .client
            .post(url.clone())
            .header(header::AUTHORIZATION, bearer(token))
            .header(header::CONTENT_LENGTH, 0);
        self.send(request).await
    }

    /// Make a form-encoded POST request
    pub async fn post_form(
        &self,
        url: &Url,
        form: &[(&str, &str)],
    ) -> Result<HttpReply, StepError> {
        debug!("POST {} (form)", url);
        let request = self.client.post(url.clone()).form(form);
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<HttpReply, StepError> {
        let response = request
            .header(CLIENT_REQUEST_ID, generate_request_id())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!("HTTP status {}", status);

        Ok(HttpReply { status, body })
    }
}

fn bearer(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}

/// Error message found in an Azure error body, or the raw body
pub fn error_message(reply: &HttpReply) -> String {
    #[derive(serde::Deserialize)]
    struct ArmError {
        error: ArmErrorDetail,
    }

    #[derive(serde::Deserialize)]
    struct ArmErrorDetail {
        #[serde(default)]
        code: String,
        #[serde(default)]
        message: String,
    }

    #[derive(serde::Deserialize)]
    struct OAuthError {
        error: String,
        #[serde(default)]
        error_description: String,
    }

    if let Ok(err) = serde_json::from_str::<ArmError>(&reply.body) {
        return format!("{} {}: {}", reply.status, err.error.code, err.error.message);
    }
    if let Ok(err) = serde_json::from_str::<OAuthError>(&reply.body) {
        return format!("{} {}: {}", reply.status, err.error, err.error_description);
    }
    format!("{}: {}", reply.status, reply.body)
}
