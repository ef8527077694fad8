//! # RQS Client
//!
//! Client for the RQS message broker: queues with visibility timeouts,
//! exchanges that fan messages out or route them by id, and the
//! produce/consume/acknowledge protocol on top of them.
//!
//! This library provides:
//! - Validated domain types for queues, exchanges and messages
//! - Queue and exchange provisioning (`create`, `list`, `ensure`)
//! - At-least-once message handling bound to a queue
//! - A pluggable transport with HTTP and in-memory implementations
//! - Layered settings loading
//!
//! ## Module Organization
//!
//! - [`client`] - Shared client handle and configuration
//! - [`queue`] - Queue entity and lifecycle operations
//! - [`message`] - Identifiers, unsent and delivered messages
//! - [`handler`] - Produce, consume and acknowledge for one queue
//! - [`exchange`] - Exchange entity, routing and publishing
//! - [`response`] - Success payload and broker envelope
//! - [`transport`] - Request interface and its implementations
//! - [`error`] - Error types for all operations
//! - [`config`] - File and environment settings
//!
//! ## Example
//!
//! ```no_run
//! use rqs_client::{ClientConfig, Message, MessageHandler, Queue, QueueId, RqsClient};
//!
//! # async fn example() -> Result<(), rqs_client::RqsError> {
//! let client = RqsClient::new(ClientConfig::default())?;
//! let queue = Queue::new(QueueId::new("orders")?, 30, 10)?;
//! client.ensure_queue(&queue).await?;
//!
//! let handler = MessageHandler::new(client.clone(), queue);
//! handler.produce(&[Message::from_parts("order-1", "{\"qty\": 2}")?]).await?;
//!
//! for delivered in handler.consume().await? {
//!     println!("{}: {}", delivered.message_id(), delivered.content());
//!     handler.acknowledge(delivered).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod message;
pub mod queue;
pub mod response;
pub mod transport;

pub use client::{ClientConfig, RqsClient, RqsClientBuilder};
pub use config::ClientSettings;
pub use error::{
    ConfigurationError, Operation, PublishTarget, ResourceKind, RqsError, TransportError,
    ValidationError,
};
pub use exchange::{Exchange, ExchangeType};
pub use handler::{DrainSummary, MessageHandler, ProcessOutcome};
pub use message::{
    DeliveredMessage, DeliveryToken, ExchangeId, Message, MessageId, QueueId, Timestamp,
};
pub use queue::Queue;
pub use response::SuccessResponse;
pub use transport::{
    HttpMethod, HttpTransport, InMemoryBroker, Transport, TransportRequest, TransportResponse,
};
