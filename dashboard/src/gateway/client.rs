//! HTTP client for one upstream service

use std::time::Duration;

use pipeline_api::models::ErrorResponse;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::{GatewayError, GatewayResult};

const TARGET_HEADER: &str = "X-Amz-Target";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.1";

/// HTTP client for a JSON target-protocol service.
///
/// Every operation is a `POST` to the service endpoint with the operation
/// named in the target header.
pub struct ServiceClient {
    client: Client,
    endpoint: String,
    target_prefix: &'static str,
    credentials: Option<SecretString>,
}

impl ServiceClient {
    /// Create a new service client
    pub fn new(
        endpoint: &str,
        target_prefix: &'static str,
        credentials: Option<SecretString>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            target_prefix,
            credentials,
        })
    }

    /// Get the endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke an operation
    pub async fn call<I: Serialize, O: DeserializeOwned>(
        &self,
        operation: &str,
        input: &I,
    ) -> GatewayResult<O> {
        let target = format!("{}.{}", self.target_prefix, operation);
        debug!("POST {} ({})", self.endpoint, target);

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(TARGET_HEADER, &target)
            .header(header::CONTENT_TYPE, CONTENT_TYPE_JSON)
            .body(serde_json::to_vec(input)?);

        if let Some(credentials) = &self.credentials {
            request = request.bearer_auth(credentials.expose_secret());
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("{} failed: {} - {}", target, status, body);
            return Err(service_error(status, &body));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Map an error response onto the provider's own message
fn service_error(status: reqwest::StatusCode, body: &str) -> GatewayError {
    let parsed: ErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let message = match parsed.message.as_deref() {
        Some(message) if !message.is_empty() => message.to_string(),
        _ if !body.trim().is_empty() => format!("{}: {}", status, body.trim()),
        _ => status.to_string(),
    };

    GatewayError::Service {
        kind: parsed.short_type().map(str::to_string),
        message,
    }
}
