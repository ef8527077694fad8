//! In-process broker emulation for testing and development.
//!
//! [`InMemoryBroker`] answers the same eight endpoints as a real broker with
//! the same status codes and `{"data": ..., "error": ...}` envelopes, so the
//! protocol core can be exercised without a network:
//!
//! - visibility timeouts, with a fresh delivery token on every delivery
//! - fanout and ID routing through exchanges
//! - 409 on duplicate creation, 400 on unknown queues, exchanges and tokens
//!
//! Time is read from a clock that tests can move forward with
//! [`InMemoryBroker::advance_time`].

use super::{HttpMethod, Transport, TransportRequest, TransportResponse};
use crate::error::TransportError;
use crate::exchange::ExchangeType;
use crate::response::Envelope;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const STATUS_ACCEPTED: u16 = 202;
const STATUS_BAD_REQUEST: u16 = 400;
const STATUS_NOT_FOUND: u16 = 404;
const STATUS_CONFLICT: u16 = 409;

// ============================================================================
// Internal Storage Structures
// ============================================================================

struct BrokerState {
    queues: HashMap<String, StoredQueue>,
    /// Queue ids in creation order
    queue_order: Vec<String>,
    exchanges: HashMap<String, StoredExchange>,
    exchange_order: Vec<String>,
    clock_offset: Duration,
    requests_seen: usize,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            queues: HashMap::new(),
            queue_order: Vec::new(),
            exchanges: HashMap::new(),
            exchange_order: Vec::new(),
            clock_offset: Duration::zero(),
            requests_seen: 0,
        }
    }
}

impl BrokerState {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.clock_offset
    }
}

struct StoredQueue {
    visibility_timeout: Duration,
    max_batch: usize,
    messages: Vec<StoredMessage>,
}

impl StoredQueue {
    fn push(&mut self, message_id: &str, content: &str) -> String {
        let uuid = Uuid::new_v4().to_string();
        self.messages.push(StoredMessage {
            uuid: uuid.clone(),
            message_id: message_id.to_string(),
            content: content.to_string(),
            lease: None,
        });
        uuid
    }
}

struct StoredMessage {
    /// Broker-side identity, independent of any delivery
    uuid: String,
    message_id: String,
    content: String,
    lease: Option<Lease>,
}

impl StoredMessage {
    fn is_visible(&self, now: DateTime<Utc>) -> bool {
        match &self.lease {
            None => true,
            Some(lease) => now >= lease.expires_at,
        }
    }
}

/// Outstanding delivery of a message
struct Lease {
    token: String,
    expires_at: DateTime<Utc>,
}

struct StoredExchange {
    queue_ids: Vec<String>,
    exchange_type: ExchangeType,
}

// ============================================================================
// Request and Response Bodies
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewQueueBody {
    queue_id: String,
    read_timeout: u32,
    max_batch: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingMessage {
    message_id: String,
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMessagesBody {
    messages: Vec<IncomingMessage>,
    queue_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteMessageBody {
    queue_id: String,
    message_uuid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewExchangeBody {
    id: String,
    queue_ids: Vec<String>,
    exchange_type: ExchangeType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeMessagesBody {
    messages: Vec<IncomingMessage>,
    exchange_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Delivery {
    message_id: String,
    content: String,
    uuid: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeEntry<'a> {
    id: &'a str,
    queue_ids: &'a [String],
    exchange_type: ExchangeType,
}

fn accepted(data: impl Serialize) -> TransportResponse {
    let body = serde_json::to_value(Envelope::success(data)).unwrap_or(Value::Null);
    TransportResponse::new(STATUS_ACCEPTED, body)
}

fn rejected(status: u16, error: impl Into<String>) -> TransportResponse {
    let body = serde_json::to_value(Envelope::failure(error)).unwrap_or(Value::Null);
    TransportResponse::new(status, body)
}

/// Plain-text answer for bodies that do not match the endpoint's schema
fn malformed() -> TransportResponse {
    TransportResponse::new(
        STATUS_BAD_REQUEST,
        Value::String("JSON was malformed".to_string()),
    )
}

fn parse<T: DeserializeOwned>(body: Option<Value>) -> Option<T> {
    body.and_then(|b| serde_json::from_value(b).ok())
}

// ============================================================================
// InMemoryBroker
// ============================================================================

/// Thread-safe in-memory broker implementing [`Transport`]
///
/// Clones share the same state, so a test can keep one handle for
/// inspection while a client owns another.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the broker clock forward, e.g. past a visibility timeout.
    pub fn advance_time(&self, by: Duration) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.clock_offset = state.clock_offset + by;
    }

    /// Number of requests answered so far
    pub fn request_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .requests_seen
    }

    /// Messages held by a queue, in flight or not
    pub fn queue_depth(&self, queue_id: &str) -> Option<usize> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .queues
            .get(queue_id)
            .map(|q| q.messages.len())
    }

    fn lock(&self) -> Result<RwLockWriteGuard<'_, BrokerState>, TransportError> {
        self.state.write().map_err(|_| TransportError::Unavailable {
            message: "in-memory broker state is poisoned".to_string(),
        })
    }

    fn new_queue(state: &mut BrokerState, body: Option<Value>) -> TransportResponse {
        let Some(body) = parse::<NewQueueBody>(body) else {
            return malformed();
        };

        if state.queues.contains_key(&body.queue_id) {
            return rejected(
                STATUS_CONFLICT,
                format!("A queue with id {} already exists", body.queue_id),
            );
        }
        if body.read_timeout == 0 || body.max_batch == 0 {
            return rejected(
                STATUS_BAD_REQUEST,
                "readTimeout and maxBatch must be positive",
            );
        }

        state.queues.insert(
            body.queue_id.clone(),
            StoredQueue {
                visibility_timeout: Duration::seconds(i64::from(body.read_timeout)),
                max_batch: body.max_batch as usize,
                messages: Vec::new(),
            },
        );
        state.queue_order.push(body.queue_id);
        accepted(Uuid::new_v4().to_string())
    }

    fn list_queues(state: &BrokerState) -> TransportResponse {
        accepted(&state.queue_order)
    }

    fn add_messages(state: &mut BrokerState, body: Option<Value>) -> TransportResponse {
        let Some(body) = parse::<NewMessagesBody>(body) else {
            return malformed();
        };

        let Some(queue) = state.queues.get_mut(&body.queue_id) else {
            return rejected(
                STATUS_BAD_REQUEST,
                format!("No queue with id {} was found", body.queue_id),
            );
        };

        let uuids: Vec<String> = body
            .messages
            .iter()
            .map(|m| queue.push(&m.message_id, &m.content))
            .collect();
        accepted(uuids)
    }

    fn get_messages(state: &mut BrokerState, request: &TransportRequest) -> TransportResponse {
        let Some(queue_id) = request.query_param("queueId") else {
            return rejected(STATUS_BAD_REQUEST, "Missing queueId query parameter");
        };

        let now = state.now();
        let Some(queue) = state.queues.get_mut(queue_id) else {
            return rejected(
                STATUS_BAD_REQUEST,
                format!("No queue with id {} was found", queue_id),
            );
        };

        let visibility_timeout = queue.visibility_timeout;
        let max_batch = queue.max_batch;
        let mut deliveries = Vec::new();
        for message in queue
            .messages
            .iter_mut()
            .filter(|m| m.is_visible(now))
            .take(max_batch)
        {
            let token = Uuid::new_v4().to_string();
            deliveries.push(Delivery {
                message_id: message.message_id.clone(),
                content: message.content.clone(),
                uuid: token.clone(),
            });
            message.lease = Some(Lease {
                token,
                expires_at: now + visibility_timeout,
            });
        }

        accepted(deliveries)
    }

    fn delete_message(state: &mut BrokerState, body: Option<Value>) -> TransportResponse {
        let Some(body) = parse::<DeleteMessageBody>(body) else {
            return malformed();
        };

        let now = state.now();
        let Some(queue) = state.queues.get_mut(&body.queue_id) else {
            return rejected(
                STATUS_BAD_REQUEST,
                format!("No queue with id {} was found", body.queue_id),
            );
        };

        let position = queue.messages.iter().position(|m| {
            m.lease
                .as_ref()
                .is_some_and(|lease| lease.token == body.message_uuid && now < lease.expires_at)
        });

        match position {
            Some(index) => {
                let removed = queue.messages.remove(index);
                accepted(format!("Successfully deleted uuid {}", removed.uuid))
            }
            None => rejected(
                STATUS_BAD_REQUEST,
                format!(
                    "No message with uuid {} found, or the message is past its visibility timeout",
                    body.message_uuid
                ),
            ),
        }
    }

    fn new_exchange(state: &mut BrokerState, body: Option<Value>) -> TransportResponse {
        let Some(body) = parse::<NewExchangeBody>(body) else {
            return malformed();
        };

        if let Some(missing) = body
            .queue_ids
            .iter()
            .find(|id| !state.queues.contains_key(*id))
        {
            return rejected(
                STATUS_BAD_REQUEST,
                format!("No queue with id {} was found", missing),
            );
        }
        if state.exchanges.contains_key(&body.id) {
            return rejected(
                STATUS_CONFLICT,
                format!("An exchange with id {} already exists", body.id),
            );
        }

        state.exchanges.insert(
            body.id.clone(),
            StoredExchange {
                queue_ids: body.queue_ids,
                exchange_type: body.exchange_type,
            },
        );
        state.exchange_order.push(body.id);
        accepted(Uuid::new_v4().to_string())
    }

    fn list_exchanges(state: &BrokerState) -> TransportResponse {
        let entries: Vec<ExchangeEntry<'_>> = state
            .exchange_order
            .iter()
            .filter_map(|id| {
                state.exchanges.get(id).map(|exchange| ExchangeEntry {
                    id,
                    queue_ids: &exchange.queue_ids,
                    exchange_type: exchange.exchange_type,
                })
            })
            .collect();
        accepted(entries)
    }

    /// Route a batch through an exchange. The whole batch is rejected if any
    /// message has no destination.
    fn add_messages_to_exchange(state: &mut BrokerState, body: Option<Value>) -> TransportResponse {
        let Some(body) = parse::<ExchangeMessagesBody>(body) else {
            return malformed();
        };

        let Some(exchange) = state.exchanges.get(&body.exchange_id) else {
            return rejected(
                STATUS_BAD_REQUEST,
                format!("No exchange with id {} was found", body.exchange_id),
            );
        };

        let mut plan: Vec<(String, &IncomingMessage)> = Vec::new();
        for message in &body.messages {
            let destinations: Vec<&String> = match exchange.exchange_type {
                ExchangeType::Fanout => exchange.queue_ids.iter().collect(),
                ExchangeType::Id => exchange
                    .queue_ids
                    .iter()
                    .filter(|id| **id == message.message_id)
                    .collect(),
            };
            if destinations.is_empty() {
                return rejected(
                    STATUS_BAD_REQUEST,
                    format!("Queue with id {} was not found", message.message_id),
                );
            }
            plan.extend(destinations.into_iter().map(|id| (id.clone(), message)));
        }

        if let Some((missing, _)) = plan.iter().find(|(id, _)| !state.queues.contains_key(id)) {
            return rejected(
                STATUS_BAD_REQUEST,
                format!("Queue with id {} was not found", missing),
            );
        }

        let mut uuids = Vec::with_capacity(plan.len());
        for (queue_id, message) in plan {
            if let Some(queue) = state.queues.get_mut(&queue_id) {
                uuids.push(queue.push(&message.message_id, &message.content));
            }
        }
        accepted(uuids)
    }
}

impl std::fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBroker").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut state = self.lock()?;
        state.requests_seen += 1;

        let path = request.path.trim_end_matches('/');
        let response = match (request.method, path) {
            (HttpMethod::Post, "/queue/new") => Self::new_queue(&mut state, request.body.clone()),
            (HttpMethod::Get, "/queue/list") => Self::list_queues(&state),
            (HttpMethod::Post, "/message/new") => {
                Self::add_messages(&mut state, request.body.clone())
            }
            (HttpMethod::Get, "/message/get") => Self::get_messages(&mut state, &request),
            (HttpMethod::Post, "/message/delete") => {
                Self::delete_message(&mut state, request.body.clone())
            }
            (HttpMethod::Post, "/exchange/new") => {
                Self::new_exchange(&mut state, request.body.clone())
            }
            (HttpMethod::Get, "/exchange/list") => Self::list_exchanges(&state),
            (HttpMethod::Post, "/exchange/add") => {
                Self::add_messages_to_exchange(&mut state, request.body.clone())
            }
            _ => rejected(
                STATUS_NOT_FOUND,
                format!("No route for {} {}", request.method, request.path),
            ),
        };

        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "In-memory broker answered"
        );
        Ok(response)
    }
}
