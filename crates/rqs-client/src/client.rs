//! Broker client shared by every protocol operation.
//!
//! [`RqsClient`] bundles a [`Transport`] with the [`ClientConfig`]. It is a
//! cheap clone (the transport sits behind an `Arc`) and holds no mutable
//! state, so queues, exchanges and message handlers each keep their own copy.
//!
//! The protocol operations themselves live next to the entities they act
//! on: queue lifecycle in `queue`, exchange routing in `exchange` and the
//! produce/consume/acknowledge protocol in `handler`.

use crate::error::{Operation, ResourceKind, RqsError, TransportError};
use crate::response::{extract_data, identifier_list, SuccessResponse};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Configuration for broker client behavior.
///
/// # Examples
///
/// ```
/// use rqs_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_base_url("http://broker.internal:8080")
///     .with_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Broker root URL
    pub base_url: String,
    /// Default request timeout
    pub timeout: Duration,
    /// User agent string for requests
    pub user_agent: String,
    /// Check ID-routed messages against the exchange's bound queues before publishing
    pub validate_routing: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("rqs-client/", env!("CARGO_PKG_VERSION")).to_string(),
            validate_routing: true,
        }
    }
}

impl ClientConfig {
    /// Set the broker root URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable local routing checks for ID exchanges.
    pub fn with_validate_routing(mut self, validate_routing: bool) -> Self {
        self.validate_routing = validate_routing;
        self
    }
}

/// Client for the broker API.
///
/// # Examples
///
/// ```no_run
/// # use rqs_client::{ClientConfig, RqsClient};
/// # async fn example() -> Result<(), rqs_client::RqsError> {
/// let client = RqsClient::builder()
///     .config(ClientConfig::default().with_base_url("http://127.0.0.1:8080"))
///     .build()?;
///
/// let queues = client.list_queues().await?;
/// println!("{} queue(s)", queues.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RqsClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    deadline: Option<Duration>,
}

impl RqsClient {
    /// Create a new builder for constructing a client.
    pub fn builder() -> RqsClientBuilder {
        RqsClientBuilder::new()
    }

    /// Create a client talking HTTP to the broker named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `RqsError::Transport` if the HTTP transport cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, RqsError> {
        Self::builder().config(config).build()
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(transport: impl Transport + 'static, config: ClientConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config,
            deadline: None,
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Per-call deadline attached to every request, if any.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Return a copy of this client whose requests carry `deadline`.
    ///
    /// The deadline is handed to the transport with each request and overrides
    /// the configured default timeout for those calls only.
    pub fn with_deadline(&self, deadline: Duration) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
            deadline: Some(deadline),
        }
    }

    /// Send one request and return the raw response.
    ///
    /// Error statuses are returned as responses; only transport failures become `Err`.
    pub(crate) async fn execute(
        &self,
        operation: Operation,
        request: TransportRequest,
    ) -> Result<TransportResponse, RqsError> {
        let request = request.with_deadline(self.deadline);
        debug!(
            operation = %operation,
            method = %request.method,
            path = %request.path,
            "Sending broker request"
        );

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(operation = %operation, error = %e, "Broker request failed in transport");
            RqsError::Transport(e)
        })?;

        if response.is_error() {
            debug!(
                operation = %operation,
                status = response.status,
                "Broker rejected request"
            );
        }

        Ok(response)
    }

    /// Register a queue or exchange, mapping 409 to `Conflict`.
    pub(crate) async fn create_resource(
        &self,
        resource: ResourceKind,
        id: &str,
        path: &str,
        body: Value,
    ) -> Result<SuccessResponse, RqsError> {
        let operation = match resource {
            ResourceKind::Queue => Operation::CreateQueue,
            ResourceKind::Exchange => Operation::CreateExchange,
        };

        let response = self
            .execute(operation, TransportRequest::post(path, body))
            .await?;

        match response.status {
            409 => Err(RqsError::Conflict {
                resource,
                id: id.to_string(),
                body: response.body,
            }),
            status if status >= 400 => Err(RqsError::CreateFailed {
                resource,
                id: id.to_string(),
                status,
                body: response.body,
            }),
            _ => {
                info!(resource = %resource, id = %id, "Created broker resource");
                Ok(SuccessResponse::new(extract_data(operation, response.body)?))
            }
        }
    }

    /// Fetch the identifiers of all queues or exchanges.
    pub(crate) async fn list_resources(
        &self,
        resource: ResourceKind,
        path: &str,
    ) -> Result<Vec<String>, RqsError> {
        let operation = match resource {
            ResourceKind::Queue => Operation::ListQueues,
            ResourceKind::Exchange => Operation::ListExchanges,
        };

        let response = self.execute(operation, TransportRequest::get(path)).await?;
        if response.is_error() {
            return Err(RqsError::ListFailed {
                resource,
                status: response.status,
                body: response.body,
            });
        }

        identifier_list(operation, extract_data(operation, response.body)?)
    }
}

/// Serialize a request body
pub(crate) fn json_body(body: &impl Serialize) -> Result<Value, RqsError> {
    serde_json::to_value(body).map_err(|e| {
        RqsError::Transport(TransportError::InvalidRequest {
            message: format!("Failed to serialize request body: {}", e),
        })
    })
}

impl std::fmt::Debug for RqsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RqsClient")
            .field("config", &self.config)
            .field("deadline", &self.deadline)
            .field("transport", &"<Transport>")
            .finish()
    }
}

/// Builder for constructing `RqsClient` instances.
#[derive(Default)]
pub struct RqsClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
}

impl RqsClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client configuration.
    ///
    /// If not set, uses `ClientConfig::default()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a specific transport instead of HTTP.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns `RqsError::Transport` if no transport was given and the HTTP
    /// transport cannot be created from the configuration.
    pub fn build(self) -> Result<RqsClient, RqsError> {
        let config = self.config.unwrap_or_default();

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&config)?),
        };

        Ok(RqsClient {
            transport,
            config,
            deadline: None,
        })
    }
}
