//! Common test utilities for rqs-client integration tests
//!
//! This module provides:
//! - A client wired to a shared in-memory broker
//! - Builders for queues, exchanges and message batches

use rqs_client::{
    ClientConfig, Exchange, ExchangeId, ExchangeType, InMemoryBroker, Message, MessageHandler,
    Queue, QueueId, RqsClient,
};

/// A client and the broker it talks to
pub struct TestBroker {
    pub broker: InMemoryBroker,
    pub client: RqsClient,
}

impl TestBroker {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    #[allow(dead_code)]
    pub fn with_config(config: ClientConfig) -> Self {
        let broker = InMemoryBroker::new();
        let client = RqsClient::with_transport(broker.clone(), config);
        Self { broker, client }
    }

    /// Create a queue on the broker and return a handler bound to it
    pub async fn queue(&self, id: &str, visibility_timeout: u32, max_batch: u32) -> MessageHandler {
        let queue = queue(id, visibility_timeout, max_batch);
        self.client
            .create_queue(&queue)
            .await
            .expect("queue creation should succeed");
        MessageHandler::new(self.client.clone(), queue)
    }

    #[allow(dead_code)]
    pub async fn exchange(&self, id: &str, exchange_type: ExchangeType, queues: &[&str]) -> Exchange {
        let exchange = exchange(id, exchange_type, queues);
        self.client
            .create_exchange(&exchange)
            .await
            .expect("exchange creation should succeed");
        exchange
    }
}

pub fn queue(id: &str, visibility_timeout: u32, max_batch: u32) -> Queue {
    Queue::new(QueueId::new(id).unwrap(), visibility_timeout, max_batch).unwrap()
}

#[allow(dead_code)]
pub fn exchange(id: &str, exchange_type: ExchangeType, queues: &[&str]) -> Exchange {
    let queues = queues.iter().map(|q| QueueId::new(*q).unwrap()).collect();
    Exchange::new(ExchangeId::new(id).unwrap(), exchange_type, queues).unwrap()
}

/// Build messages from `(id, content)` pairs
pub fn messages(pairs: &[(&str, &str)]) -> Vec<Message> {
    pairs
        .iter()
        .map(|(id, content)| Message::from_parts(*id, *content).unwrap())
        .collect()
}
