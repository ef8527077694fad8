//! Queue identity, configuration and lifecycle operations.

use crate::client::{json_body, RqsClient};
use crate::error::{Operation, ResourceKind, RqsError, ValidationError};
use crate::message::QueueId;
use crate::response::SuccessResponse;
use chrono::Duration;
use serde::Serialize;
use tracing::{debug, info};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// A named message channel on the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    queue_id: QueueId,
    visibility_timeout_secs: u32,
    max_batch: u32,
}

impl Queue {
    /// Create new queue description with validation
    ///
    /// # Arguments
    ///
    /// * `queue_id` - Unique queue identifier
    /// * `visibility_timeout_secs` - Seconds a delivered message stays hidden from other consumers
    /// * `max_batch` - Upper bound on messages returned per consume call
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfRange` if either number is zero.
    pub fn new(
        queue_id: QueueId,
        visibility_timeout_secs: u32,
        max_batch: u32,
    ) -> Result<Self, ValidationError> {
        if visibility_timeout_secs == 0 {
            return Err(ValidationError::OutOfRange {
                field: "visibility_timeout".to_string(),
                message: "must be a positive number of seconds".to_string(),
            });
        }

        if max_batch == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_batch".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            queue_id,
            visibility_timeout_secs,
            max_batch,
        })
    }

    pub fn queue_id(&self) -> &QueueId {
        &self.queue_id
    }

    pub fn visibility_timeout_secs(&self) -> u32 {
        self.visibility_timeout_secs
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::seconds(i64::from(self.visibility_timeout_secs))
    }

    pub fn max_batch(&self) -> u32 {
        self.max_batch
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewQueueRequest<'a> {
    read_timeout: u32,
    max_batch: u32,
    queue_id: &'a str,
}

impl RqsClient {
    /// Create a queue on the broker.
    ///
    /// Not idempotent: creating an existing id fails with
    /// `RqsError::Conflict`. Use [`RqsClient::ensure_queue`] for
    /// check-then-create provisioning.
    ///
    /// # Errors
    ///
    /// - `RqsError::Conflict` if the id already exists
    /// - `RqsError::CreateFailed` for any other error status
    /// - `RqsError::Transport` if the broker could not be reached
    pub async fn create_queue(&self, queue: &Queue) -> Result<SuccessResponse, RqsError> {
        let body = json_body(&NewQueueRequest {
            read_timeout: queue.visibility_timeout_secs,
            max_batch: queue.max_batch,
            queue_id: queue.queue_id.as_str(),
        })?;

        self.create_resource(ResourceKind::Queue, queue.queue_id.as_str(), "/queue/new", body)
            .await
    }

    /// List the ids of all queues known to the broker.
    pub async fn list_queues(&self) -> Result<Vec<QueueId>, RqsError> {
        let ids = self
            .list_resources(ResourceKind::Queue, "/queue/list")
            .await?;

        ids.into_iter()
            .map(|id| {
                QueueId::new(id).map_err(|e| RqsError::InvalidResponse {
                    operation: Operation::ListQueues,
                    message: format!("broker listed an invalid queue id: {}", e),
                })
            })
            .collect()
    }

    /// Create the queue unless the broker already lists it.
    ///
    /// Returns `true` when the queue was created by this call. Two callers
    /// racing on the same id may both see it missing; the loser gets
    /// `RqsError::Conflict`.
    pub async fn ensure_queue(&self, queue: &Queue) -> Result<bool, RqsError> {
        let existing = self.list_queues().await?;
        if existing.contains(&queue.queue_id) {
            debug!(queue_id = %queue.queue_id, "Queue already exists");
            return Ok(false);
        }

        self.create_queue(queue).await?;
        info!(
            queue_id = %queue.queue_id,
            visibility_timeout_secs = queue.visibility_timeout_secs,
            max_batch = queue.max_batch,
            "Provisioned queue"
        );
        Ok(true)
    }
}
