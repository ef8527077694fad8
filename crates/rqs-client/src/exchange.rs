//! Exchanges: routing of produced messages onto bound queues.
//!
//! Two routing policies are supported:
//!
//! - [`ExchangeType::Fanout`] copies every message to every bound queue
//! - [`ExchangeType::Id`] delivers a message to the single bound queue whose
//!   id equals the message id
//!
//! Routing itself happens on the broker. [`Exchange::route`] computes the
//! same plan locally so callers (and the client, before publishing to an ID
//! exchange) can detect unroutable messages without a round trip.

use crate::client::{json_body, RqsClient};
use crate::error::{Operation, PublishTarget, ResourceKind, RqsError, ValidationError};
use crate::message::{ExchangeId, Message, QueueId, WireMessage};
use crate::response::{extract_data, SuccessResponse};
use crate::transport::TransportRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info};

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod tests;

/// Routing policy of an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExchangeType {
    #[serde(rename = "FANOUT")]
    Fanout,
    #[serde(rename = "ID")]
    Id,
}

impl ExchangeType {
    /// Wire name of the routing policy
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fanout => "FANOUT",
            Self::Id => "ID",
        }
    }
}

impl std::fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FANOUT" => Ok(Self::Fanout),
            "ID" => Ok(Self::Id),
            _ => Err(ValidationError::InvalidFormat {
                field: "exchange_type".to_string(),
                message: format!("'{}' is not one of FANOUT, ID", s),
            }),
        }
    }
}

/// A routing layer over an ordered set of queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    exchange_id: ExchangeId,
    exchange_type: ExchangeType,
    bound_queues: Vec<QueueId>,
}

impl Exchange {
    /// Create new exchange description with validation
    ///
    /// # Errors
    ///
    /// - `ValidationError::Required` if `bound_queues` is empty
    /// - `ValidationError::DuplicateBinding` if a queue appears twice
    pub fn new(
        exchange_id: ExchangeId,
        exchange_type: ExchangeType,
        bound_queues: Vec<QueueId>,
    ) -> Result<Self, ValidationError> {
        if bound_queues.is_empty() {
            return Err(ValidationError::Required {
                field: "bound_queues".to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(bound_queues.len());
        for queue_id in &bound_queues {
            if !seen.insert(queue_id) {
                return Err(ValidationError::DuplicateBinding {
                    exchange_id,
                    queue_id: queue_id.clone(),
                });
            }
        }

        Ok(Self {
            exchange_id,
            exchange_type,
            bound_queues,
        })
    }

    pub fn exchange_id(&self) -> &ExchangeId {
        &self.exchange_id
    }

    pub fn exchange_type(&self) -> ExchangeType {
        self.exchange_type
    }

    /// Bound queues, in binding order
    pub fn bound_queues(&self) -> &[QueueId] {
        &self.bound_queues
    }

    /// Queues a message would be delivered to.
    ///
    /// Empty for an ID exchange when no bound queue matches the message id.
    pub fn route(&self, message: &Message) -> Vec<&QueueId> {
        match self.exchange_type {
            ExchangeType::Fanout => self.bound_queues.iter().collect(),
            ExchangeType::Id => self
                .bound_queues
                .iter()
                .filter(|q| q.as_str() == message.message_id().as_str())
                .collect(),
        }
    }

    fn check_routable(&self, messages: &[Message]) -> Result<(), ValidationError> {
        match messages.iter().find(|m| self.route(m).is_empty()) {
            Some(message) => Err(ValidationError::Unroutable {
                exchange_id: self.exchange_id.clone(),
                message_id: message.message_id().clone(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewExchangeRequest<'a> {
    id: &'a str,
    queue_ids: Vec<&'a str>,
    exchange_type: ExchangeType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeProduceRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    exchange_id: &'a str,
}

impl RqsClient {
    /// Create an exchange and its bindings on the broker.
    ///
    /// Every bound queue must already exist; the broker rejects unknown ones.
    pub async fn create_exchange(&self, exchange: &Exchange) -> Result<SuccessResponse, RqsError> {
        let body = json_body(&NewExchangeRequest {
            id: exchange.exchange_id.as_str(),
            queue_ids: exchange.bound_queues.iter().map(QueueId::as_str).collect(),
            exchange_type: exchange.exchange_type,
        })?;

        self.create_resource(
            ResourceKind::Exchange,
            exchange.exchange_id.as_str(),
            "/exchange/new",
            body,
        )
        .await
    }

    /// List the ids of all exchanges known to the broker.
    pub async fn list_exchanges(&self) -> Result<Vec<ExchangeId>, RqsError> {
        let ids = self
            .list_resources(ResourceKind::Exchange, "/exchange/list")
            .await?;

        ids.into_iter()
            .map(|id| {
                ExchangeId::new(id).map_err(|e| RqsError::InvalidResponse {
                    operation: Operation::ListExchanges,
                    message: format!("broker listed an invalid exchange id: {}", e),
                })
            })
            .collect()
    }

    /// Create the exchange unless the broker already lists it.
    ///
    /// Returns `true` when the exchange was created by this call. An existing
    /// exchange is left as is, even if its bindings differ.
    pub async fn ensure_exchange(&self, exchange: &Exchange) -> Result<bool, RqsError> {
        let existing = self.list_exchanges().await?;
        if existing.contains(&exchange.exchange_id) {
            debug!(exchange_id = %exchange.exchange_id, "Exchange already exists");
            return Ok(false);
        }

        self.create_exchange(exchange).await?;
        info!(
            exchange_id = %exchange.exchange_id,
            exchange_type = %exchange.exchange_type,
            bound_queues = exchange.bound_queues.len(),
            "Provisioned exchange"
        );
        Ok(true)
    }

    /// Produce a batch of messages through an exchange.
    ///
    /// With `validate_routing` enabled, a batch for an ID exchange that holds
    /// a message matching no bound queue is rejected before anything is sent.
    ///
    /// # Errors
    ///
    /// - `RqsError::Validation` for an empty batch or an unroutable message
    /// - `RqsError::Publish` if the broker rejects the batch
    pub async fn produce_to_exchange(
        &self,
        exchange: &Exchange,
        messages: &[Message],
    ) -> Result<SuccessResponse, RqsError> {
        if messages.is_empty() {
            return Err(ValidationError::Required {
                field: "messages".to_string(),
            }
            .into());
        }

        if self.config().validate_routing {
            exchange.check_routable(messages)?;
        }

        let body = json_body(&ExchangeProduceRequest {
            messages: messages.iter().map(Message::to_wire).collect(),
            exchange_id: exchange.exchange_id.as_str(),
        })?;

        let response = self
            .execute(
                Operation::ProduceToExchange,
                TransportRequest::post("/exchange/add", body),
            )
            .await?;

        if response.is_error() {
            return Err(RqsError::Publish {
                target: PublishTarget::Exchange(exchange.exchange_id.clone()),
                message_ids: messages.iter().map(|m| m.message_id().clone()).collect(),
                status: response.status,
                body: response.body,
            });
        }

        debug!(
            exchange_id = %exchange.exchange_id,
            exchange_type = %exchange.exchange_type,
            count = messages.len(),
            "Produced messages to exchange"
        );
        Ok(SuccessResponse::new(extract_data(
            Operation::ProduceToExchange,
            response.body,
        )?))
    }
}
