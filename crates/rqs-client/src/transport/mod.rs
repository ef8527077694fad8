//! Transport collaborators.
//!
//! The protocol core talks to the broker only through the [`Transport`]
//! trait: one request in, one status code plus JSON body out. Two
//! implementations ship with the crate:
//!
//! - [`HttpTransport`] - reqwest-based client for a running broker
//! - [`InMemoryBroker`] - in-process emulation of the broker for tests and development

use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub mod http;
pub mod memory;

pub use http::HttpTransport;
pub use memory::InMemoryBroker;

/// HTTP methods used by the broker API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A single request to the broker
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Upper bound for this call, overriding the transport default
    pub deadline: Option<Duration>,
}

impl TransportRequest {
    /// Create a GET request without query parameters
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            deadline: None,
        }
    }

    /// Create a POST request with a JSON body
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            deadline: None,
        }
    }

    /// Add a query parameter
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the per-call deadline
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Look up a query parameter by name
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The broker's answer: status code plus JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Any status of 400 or above is a protocol-level failure
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Narrow request interface the protocol core depends on
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request/response exchange with the broker.
    ///
    /// Returns `Err` only when the exchange itself failed (connection refused,
    /// timeout). Broker-reported failures come back as responses with an
    /// error status.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}
