//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

const MAX_IDENTIFIER_LENGTH: usize = 256;

fn validate_identifier(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            message: format!("maximum {} characters", MAX_IDENTIFIER_LENGTH),
        });
    }

    if value.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            message: "control characters are not allowed".to_string(),
        });
    }

    Ok(())
}

/// Validated identifier of a queue on the broker
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueId(String);

impl QueueId {
    /// Create new queue id with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        validate_identifier("queue_id", &id)?;
        Ok(Self(id))
    }

    /// Get queue id as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for QueueId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueId> for String {
    fn from(id: QueueId) -> Self {
        id.0
    }
}

/// Validated identifier of an exchange on the broker
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExchangeId(String);

impl ExchangeId {
    /// Create new exchange id with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        validate_identifier("exchange_id", &id)?;
        Ok(Self(id))
    }

    /// Get exchange id as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExchangeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ExchangeId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExchangeId> for String {
    fn from(id: ExchangeId) -> Self {
        id.0
    }
}

/// Caller-assigned message identifier.
///
/// Serves as the application key of a message. When the message is produced
/// to an ID-routed exchange it also names the destination queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageId(String);

impl MessageId {
    /// Create new message id with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        validate_identifier("message_id", &id)?;
        Ok(Self(id))
    }

    /// Use a queue id as the message id, addressing that queue through an ID exchange
    pub fn for_queue(queue_id: &QueueId) -> Self {
        Self(queue_id.as_str().to_string())
    }

    /// Get message id as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MessageId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

/// Opaque broker-issued handle identifying one delivery of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryToken(String);

impl DeliveryToken {
    /// Wrap a token string returned by the broker
    pub fn new(token: impl Into<String>) -> Result<Self, ValidationError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ValidationError::Required {
                field: "delivery_token".to_string(),
            });
        }
        Ok(Self(token))
    }

    /// Get handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message to be produced to a queue or exchange.
///
/// An unsent message never carries a delivery token; only
/// [`DeliveredMessage`] values obtained from a consume call can be
/// acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    message_id: MessageId,
    content: String,
}

impl Message {
    /// Create new message with validated id and non-empty content
    pub fn new(message_id: MessageId, content: impl Into<String>) -> Result<Self, ValidationError> {
        let content = content.into();
        if content.is_empty() {
            return Err(ValidationError::Required {
                field: "content".to_string(),
            });
        }

        Ok(Self {
            message_id,
            content,
        })
    }

    /// Create message from raw id and content strings
    pub fn from_parts(
        message_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(MessageId::new(message_id)?, content)
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub(crate) fn to_wire(&self) -> WireMessage<'_> {
        WireMessage {
            message_id: self.message_id.as_str(),
            content: &self.content,
        }
    }
}

/// A message handed out by a consume call, pending acknowledgement.
///
/// Holds the queue it came from by id only. Clones share the delivery token;
/// once one of them has been acknowledged the broker rejects the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    message_id: MessageId,
    content: String,
    delivery_token: DeliveryToken,
    queue_id: QueueId,
    delivered_at: Timestamp,
    visibility_timeout: Duration,
}

impl DeliveredMessage {
    pub(crate) fn new(
        message_id: MessageId,
        content: String,
        delivery_token: DeliveryToken,
        queue_id: QueueId,
        delivered_at: Timestamp,
        visibility_timeout: Duration,
    ) -> Self {
        Self {
            message_id,
            content,
            delivery_token,
            queue_id,
            delivered_at,
            visibility_timeout,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn delivery_token(&self) -> &DeliveryToken {
        &self.delivery_token
    }

    /// Queue the message was delivered from
    pub fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }

    /// Client-side time at which the consume response was received
    pub fn delivered_at(&self) -> &Timestamp {
        &self.delivered_at
    }

    /// Estimated end of the visibility window, after which the broker may redeliver
    pub fn visibility_expires_at(&self) -> Timestamp {
        Timestamp::from_datetime(self.delivered_at.as_datetime() + self.visibility_timeout)
    }

    /// Check if the visibility window has (probably) elapsed
    pub fn is_visibility_expired(&self) -> bool {
        Timestamp::now() >= self.visibility_expires_at()
    }

    /// Get time until the visibility window elapses
    pub fn time_until_redelivery(&self) -> Duration {
        let now = Timestamp::now();
        let expires_at = self.visibility_expires_at();
        if now >= expires_at {
            Duration::zero()
        } else {
            expires_at.as_datetime() - now.as_datetime()
        }
    }

    /// Convert back to an unsent Message (for forwarding/replaying)
    pub fn message(&self) -> Message {
        Message {
            message_id: self.message_id.clone(),
            content: self.content.clone(),
        }
    }
}

// ============================================================================
// Wire Representations
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMessage<'a> {
    pub message_id: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireDelivery {
    pub message_id: String,
    pub content: String,
    pub uuid: String,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
