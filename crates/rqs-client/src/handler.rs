//! Produce, consume and acknowledge protocol for a single queue.
//!
//! A message moves through three states:
//!
//! ```text
//! Message --produce--> (queued) --consume--> DeliveredMessage --acknowledge--> (removed)
//!                          ^                         |
//!                          +--- visibility expires --+
//! ```
//!
//! Delivery is at-least-once: a message that is not acknowledged before its
//! visibility timeout elapses is handed out again with a new delivery token.

use crate::client::{json_body, RqsClient};
use crate::error::{Operation, PublishTarget, RqsError, ValidationError};
use crate::message::{
    DeliveredMessage, DeliveryToken, Message, MessageId, Timestamp, WireDelivery, WireMessage,
};
use crate::queue::Queue;
use crate::response::{extract_data, SuccessResponse};
use crate::transport::TransportRequest;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;

/// Decision returned by a drain processor for each delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Delete the message from the queue
    Acknowledge,
    /// Leave the message to be redelivered after its visibility timeout
    Retain,
}

/// Counters reported by [`MessageHandler::drain`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Non-empty batches consumed
    pub batches: usize,
    pub received: usize,
    pub acknowledged: usize,
    pub retained: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProduceRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    queue_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    queue_id: &'a str,
    message_uuid: &'a str,
}

/// Message operations bound to one queue
#[derive(Debug, Clone)]
pub struct MessageHandler {
    client: RqsClient,
    queue: Queue,
}

impl MessageHandler {
    pub fn new(client: RqsClient, queue: Queue) -> Self {
        Self { client, queue }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn client(&self) -> &RqsClient {
        &self.client
    }

    /// Produce a batch of messages in a single request.
    ///
    /// # Errors
    ///
    /// - `RqsError::Validation` if `messages` is empty (nothing is sent)
    /// - `RqsError::Publish` if the broker rejects the batch
    pub async fn produce(&self, messages: &[Message]) -> Result<SuccessResponse, RqsError> {
        if messages.is_empty() {
            return Err(ValidationError::Required {
                field: "messages".to_string(),
            }
            .into());
        }

        let queue_id = self.queue.queue_id();
        let body = json_body(&ProduceRequest {
            messages: messages.iter().map(Message::to_wire).collect(),
            queue_id: queue_id.as_str(),
        })?;

        let response = self
            .client
            .execute(
                Operation::ProduceToQueue,
                TransportRequest::post("/message/new", body),
            )
            .await?;

        if response.is_error() {
            return Err(RqsError::Publish {
                target: PublishTarget::Queue(queue_id.clone()),
                message_ids: messages.iter().map(|m| m.message_id().clone()).collect(),
                status: response.status,
                body: response.body,
            });
        }

        debug!(queue_id = %queue_id, count = messages.len(), "Produced messages");
        Ok(SuccessResponse::new(extract_data(
            Operation::ProduceToQueue,
            response.body,
        )?))
    }

    /// Claim the next batch of visible messages.
    ///
    /// An empty queue yields an empty vector. Every returned message is hidden
    /// from other consumers until it is acknowledged or its visibility timeout
    /// elapses.
    ///
    /// Entries the client cannot read are skipped with a warning; the call
    /// fails with `RqsError::InvalidResponse` only when no entry of a
    /// non-empty batch is readable.
    pub async fn consume(&self) -> Result<Vec<DeliveredMessage>, RqsError> {
        let queue_id = self.queue.queue_id();
        let request =
            TransportRequest::get("/message/get").with_query("queueId", queue_id.as_str());

        let response = self.client.execute(Operation::Consume, request).await?;
        if response.is_error() {
            return Err(RqsError::Consume {
                queue_id: queue_id.clone(),
                status: response.status,
                body: response.body,
            });
        }

        let entries = match extract_data(Operation::Consume, response.body)? {
            Value::Null => Vec::new(),
            Value::Array(entries) => entries,
            entry @ Value::Object(_) => vec![entry],
            other => {
                return Err(RqsError::InvalidResponse {
                    operation: Operation::Consume,
                    message: format!("unexpected delivery payload: {}", other),
                })
            }
        };

        let delivered_at = Timestamp::now();
        let total = entries.len();
        let mut delivered = Vec::with_capacity(total);
        let mut last_error = None;
        for entry in entries {
            match self.delivered_from_wire(entry, &delivered_at) {
                Ok(message) => delivered.push(message),
                Err(e) => {
                    warn!(queue_id = %queue_id, error = %e, "Skipping malformed delivery");
                    last_error = Some(e);
                }
            }
        }

        // Every entry is already hidden broker-side; hand out the readable ones.
        if delivered.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        } else if delivered.len() < total {
            warn!(
                queue_id = %queue_id,
                skipped = total - delivered.len(),
                "Some deliveries could not be read and stay hidden until their visibility timeout"
            );
        }

        if delivered.len() > self.queue.max_batch() as usize {
            warn!(
                queue_id = %queue_id,
                received = delivered.len(),
                max_batch = self.queue.max_batch(),
                "Broker returned more messages than the queue's max batch"
            );
        }

        debug!(queue_id = %queue_id, count = delivered.len(), "Consumed messages");
        Ok(delivered)
    }

    /// Acknowledge a delivered message, removing it from the queue.
    pub async fn acknowledge(&self, message: DeliveredMessage) -> Result<SuccessResponse, RqsError> {
        message.delete(&self.client).await
    }

    /// Consume until the queue comes back empty, handing each message to `processor`.
    ///
    /// Messages for which the processor answers [`ProcessOutcome::Acknowledge`]
    /// are deleted straight away; retained messages stay invisible until their
    /// timeout and are not seen again by this call unless the timeout is
    /// shorter than the drain itself.
    pub async fn drain<F>(&self, mut processor: F) -> Result<DrainSummary, RqsError>
    where
        F: FnMut(&DeliveredMessage) -> ProcessOutcome,
    {
        let mut summary = DrainSummary::default();

        loop {
            let batch = self.consume().await?;
            if batch.is_empty() {
                break;
            }

            summary.batches += 1;
            summary.received += batch.len();

            for message in batch {
                match processor(&message) {
                    ProcessOutcome::Acknowledge => {
                        self.acknowledge(message).await?;
                        summary.acknowledged += 1;
                    }
                    ProcessOutcome::Retain => summary.retained += 1,
                }
            }
        }

        info!(
            queue_id = %self.queue.queue_id(),
            batches = summary.batches,
            received = summary.received,
            acknowledged = summary.acknowledged,
            retained = summary.retained,
            "Drained queue"
        );
        Ok(summary)
    }

    fn delivered_from_wire(
        &self,
        entry: Value,
        delivered_at: &Timestamp,
    ) -> Result<DeliveredMessage, RqsError> {
        let wire: WireDelivery =
            serde_json::from_value(entry).map_err(|e| RqsError::InvalidResponse {
                operation: Operation::Consume,
                message: format!("malformed delivery: {}", e),
            })?;

        let invalid = |e: ValidationError| RqsError::InvalidResponse {
            operation: Operation::Consume,
            message: format!("malformed delivery: {}", e),
        };

        Ok(DeliveredMessage::new(
            MessageId::new(wire.message_id).map_err(invalid)?,
            wire.content,
            DeliveryToken::new(wire.uuid).map_err(invalid)?,
            self.queue.queue_id().clone(),
            delivered_at.clone(),
            self.queue.visibility_timeout(),
        ))
    }
}

impl DeliveredMessage {
    /// Delete this delivery from its queue.
    ///
    /// Consumes the message: a token is good for one acknowledgement. The
    /// broker rejects the call if the visibility timeout has already elapsed
    /// or the message was deleted through another handle.
    pub async fn delete(self, client: &RqsClient) -> Result<SuccessResponse, RqsError> {
        let body = json_body(&DeleteRequest {
            queue_id: self.queue_id().as_str(),
            message_uuid: self.delivery_token().as_str(),
        })?;

        let response = client
            .execute(
                Operation::DeleteMessage,
                TransportRequest::post("/message/delete", body),
            )
            .await?;

        if response.is_error() {
            return Err(RqsError::Delete {
                queue_id: self.queue_id().clone(),
                message_id: self.message_id().clone(),
                delivery_token: self.delivery_token().clone(),
                status: response.status,
                body: response.body,
            });
        }

        debug!(
            queue_id = %self.queue_id(),
            message_id = %self.message_id(),
            "Acknowledged message"
        );
        Ok(SuccessResponse::new(extract_data(
            Operation::DeleteMessage,
            response.body,
        )?))
    }
}
