//! HTTP transport for a running broker.
//!
//! Thin reqwest wrapper: builds the URL from the configured base, sends the
//! JSON body and hands back the status code and body without interpreting
//! them. Non-JSON bodies (the broker answers malformed requests with plain
//! text) are surfaced as JSON strings so they still reach error reports.

use super::{HttpMethod, Transport, TransportRequest, TransportResponse};
use crate::client::ClientConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

/// reqwest-backed [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create new HTTP transport
    ///
    /// # Arguments
    ///
    /// * `base_url` - Broker root, e.g. `http://127.0.0.1:8080`
    /// * `timeout` - Default timeout applied to every request without its own deadline
    /// * `user_agent` - Value of the `User-Agent` header
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if the base URL cannot be parsed
    /// and `TransportError::Unavailable` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(base_url).map_err(|e| TransportError::InvalidRequest {
            message: format!("Invalid base URL '{}': {}", base_url, e),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest {
                message: format!("Base URL '{}' cannot carry a path", base_url),
            });
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Unavailable {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create transport from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, config.timeout, &config.user_agent)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, request: &TransportRequest) -> Result<Url, TransportError> {
        let path = request.path.strip_prefix('/').unwrap_or(&request.path);
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path)).map_err(|e| {
            TransportError::InvalidRequest {
                message: format!("Invalid request path '{}': {}", request.path, e),
            }
        })?;

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.endpoint(&request)?;

        let mut builder = match request.method {
            HttpMethod::Get => self.http_client.get(url.clone()),
            HttpMethod::Post => self.http_client.post(url.clone()),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(deadline) = request.deadline {
            builder = builder.timeout(deadline);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    message: format!("{} {}: {}", request.method, url, e),
                }
            } else if e.is_connect() {
                TransportError::ConnectionFailed {
                    message: format!("{} {}: {}", request.method, url, e),
                }
            } else {
                TransportError::RequestFailed {
                    message: format!("HTTP request failed: {}", e),
                }
            }
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    message: format!("Timed out reading response body: {}", e),
                }
            } else {
                TransportError::RequestFailed {
                    message: format!("Failed to read response body: {}", e),
                }
            }
        })?;

        debug!(
            method = %request.method,
            url = %url,
            status = status,
            body_len = text.len(),
            "Broker responded"
        );

        Ok(TransportResponse::new(status, parse_body(&text)))
    }
}

/// Decode a response body, keeping non-JSON text verbatim
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
