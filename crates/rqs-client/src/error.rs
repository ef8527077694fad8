//! Error types for broker operations.
//!
//! Every protocol failure surfaces as an [`RqsError`] carrying the operation,
//! the identifiers involved and, where the broker answered, the raw response
//! body. The client never retries on its own; [`RqsError::is_transient`] is
//! offered so callers can build their own retry policy.

use crate::message::{DeliveryToken, ExchangeId, MessageId, QueueId};
use serde_json::Value;
use thiserror::Error;

/// Broker resources that can be created and listed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Queue,
    Exchange,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Exchange => write!(f, "exchange"),
        }
    }
}

/// Protocol operations, used to label failures and log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateQueue,
    ListQueues,
    ProduceToQueue,
    Consume,
    DeleteMessage,
    CreateExchange,
    ListExchanges,
    ProduceToExchange,
}

impl Operation {
    /// Stable snake_case name of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateQueue => "create_queue",
            Self::ListQueues => "list_queues",
            Self::ProduceToQueue => "produce_to_queue",
            Self::Consume => "consume",
            Self::DeleteMessage => "delete_message",
            Self::CreateExchange => "create_exchange",
            Self::ListExchanges => "list_exchanges",
            Self::ProduceToExchange => "produce_to_exchange",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of a publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    Queue(QueueId),
    Exchange(ExchangeId),
}

impl std::fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queue(id) => write!(f, "queue '{}'", id),
            Self::Exchange(id) => write!(f, "exchange '{}'", id),
        }
    }
}

/// Error type for all client operations
#[derive(Debug, Error)]
pub enum RqsError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{resource} '{id}' already exists: {body}")]
    Conflict {
        resource: ResourceKind,
        id: String,
        body: Value,
    },

    #[error("Failed to create {resource} '{id}' (status {status}): {body}")]
    CreateFailed {
        resource: ResourceKind,
        id: String,
        status: u16,
        body: Value,
    },

    #[error("Failed to list {resource}s (status {status}): {body}")]
    ListFailed {
        resource: ResourceKind,
        status: u16,
        body: Value,
    },

    #[error(
        "Failed to publish {count} message(s) to {target} (status {status}): {body}",
        count = .message_ids.len()
    )]
    Publish {
        target: PublishTarget,
        message_ids: Vec<MessageId>,
        status: u16,
        body: Value,
    },

    #[error("Failed to consume from queue '{queue_id}' (status {status}): {body}")]
    Consume {
        queue_id: QueueId,
        status: u16,
        body: Value,
    },

    #[error(
        "Failed to delete message '{message_id}' (delivery {delivery_token}) from queue '{queue_id}' (status {status}): {body}"
    )]
    Delete {
        queue_id: QueueId,
        message_id: MessageId,
        delivery_token: DeliveryToken,
        status: u16,
        body: Value,
    },

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid response for {operation}: {message}")]
    InvalidResponse { operation: Operation, message: String },
}

impl RqsError {
    /// Operation that failed, if the error came from a protocol call
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Validation(_) | Self::Transport(_) => None,
            Self::Conflict { resource, .. } | Self::CreateFailed { resource, .. } => {
                Some(match resource {
                    ResourceKind::Queue => Operation::CreateQueue,
                    ResourceKind::Exchange => Operation::CreateExchange,
                })
            }
            Self::ListFailed { resource, .. } => Some(match resource {
                ResourceKind::Queue => Operation::ListQueues,
                ResourceKind::Exchange => Operation::ListExchanges,
            }),
            Self::Publish { target, .. } => Some(match target {
                PublishTarget::Queue(_) => Operation::ProduceToQueue,
                PublishTarget::Exchange(_) => Operation::ProduceToExchange,
            }),
            Self::Consume { .. } => Some(Operation::Consume),
            Self::Delete { .. } => Some(Operation::DeleteMessage),
            Self::InvalidResponse { operation, .. } => Some(*operation),
        }
    }

    /// HTTP status reported by the broker, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::CreateFailed { status, .. }
            | Self::ListFailed { status, .. }
            | Self::Publish { status, .. }
            | Self::Consume { status, .. }
            | Self::Delete { status, .. } => Some(*status),
            Self::Conflict { .. } => Some(409),
            _ => None,
        }
    }

    /// Raw error body returned by the broker, if any
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Conflict { body, .. }
            | Self::CreateFailed { body, .. }
            | Self::ListFailed { body, .. }
            | Self::Publish { body, .. }
            | Self::Consume { body, .. }
            | Self::Delete { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Check if error is transient and a caller-driven retry may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Conflict { .. } => false,
            Self::CreateFailed { status, .. }
            | Self::ListFailed { status, .. }
            | Self::Publish { status, .. }
            | Self::Consume { status, .. } => is_transient_status(*status),
            // A rejected acknowledgement means the delivery is gone; retrying the
            // same token cannot succeed.
            Self::Delete { .. } => false,
            Self::Transport(e) => e.is_transient(),
            Self::InvalidResponse { .. } => false,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 429
}

/// Failures of the transport collaborator itself
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Transport unavailable: {message}")]
    Unavailable { message: String },
}

impl TransportError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::RequestFailed { .. } => true,
            Self::InvalidRequest { .. } => false,
            Self::Unavailable { .. } => true,
        }
    }
}

/// Errors raised locally before any request is sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },

    #[error("Queue '{queue_id}' is bound to exchange '{exchange_id}' more than once")]
    DuplicateBinding {
        exchange_id: ExchangeId,
        queue_id: QueueId,
    },

    #[error("Message '{message_id}' does not match any queue bound to exchange '{exchange_id}'")]
    Unroutable {
        exchange_id: ExchangeId,
        message_id: MessageId,
    },
}

/// Errors while loading client settings
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parsing failed: {0}")]
    Parsing(#[from] config::ConfigError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
