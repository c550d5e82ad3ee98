//! DigitalOcean API v2 client
//!
//! Bearer token authentication over HTTPS. Every call goes through
//! [`CloudClient::execute`], which maps non-2xx responses to
//! [`CloudError::Provider`] with the provider's own message.

use crate::api::ApiErrorBody;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shipyard_cloud::{CloudError, Result, WaitPolicy};
use std::time::Duration;

pub const DIGITALOCEAN_API_BASE: &str = "https://api.digitalocean.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// DigitalOcean API client
#[derive(Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
    pub(crate) compute_wait: WaitPolicy,
    pub(crate) database_wait: WaitPolicy,
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CloudClient {
    /// Create a client for the public API
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CloudError::Config("API token is empty".into()));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            token,
            base_url: DIGITALOCEAN_API_BASE.to_string(),
            compute_wait: WaitPolicy::compute(),
            database_wait: WaitPolicy::database(),
        })
    }

    /// Point the client at another endpoint (mock servers, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_wait_policies(mut self, compute: WaitPolicy, database: WaitPolicy) -> Self {
        self.compute_wait = compute;
        self.database_wait = database;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one API call and return the decoded body.
    ///
    /// An empty 2xx body (204 on delete) yields `Value::Null`.
    pub async fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, path, "API request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CloudError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(status, &text);
            tracing::debug!(method = %method, path, status = status.as_u16(), %message, "API error");
            return Err(CloudError::provider(status.as_u16(), message));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| CloudError::UnexpectedResponse(format!("{} {}: {}", method, path, e)))
    }

    pub(crate) async fn get(&self, path: &str) -> Result<Value> {
        self.execute(Method::GET, path, None).await
    }

    pub(crate) async fn post<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.execute(Method::POST, path, Some(&body)).await
    }

    pub(crate) async fn delete_path(&self, path: &str) -> Result<()> {
        self.execute(Method::DELETE, path, None).await.map(|_| ())
    }
}

fn error_message(status: StatusCode, text: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(text) {
        Ok(body) if !body.message.is_empty() => body.message,
        _ if !text.trim().is_empty() => text.trim().to_string(),
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}

/// Pull the envelope field (`{"droplet": {...}}`) out of a response
pub(crate) fn envelope<T: DeserializeOwned>(mut value: Value, key: &str) -> Result<T> {
    let inner = value
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| CloudError::UnexpectedResponse(format!("response has no '{}' field", key)))?;
    serde_json::from_value(inner)
        .map_err(|e| CloudError::UnexpectedResponse(format!("malformed '{}': {}", key, e)))
}
