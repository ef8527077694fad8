//! Tests for queue lifecycle operations.

use super::*;
use crate::client::ClientConfig;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> RqsClient {
    RqsClient::new(ClientConfig::default().with_base_url(server.uri())).unwrap()
}

fn orders_queue() -> Queue {
    Queue::new(QueueId::new("orders").unwrap(), 30, 10).unwrap()
}

mod construction {
    use super::*;

    #[test]
    fn test_queue_validation() {
        let id = QueueId::new("orders").unwrap();

        assert!(Queue::new(id.clone(), 30, 10).is_ok());
        assert!(matches!(
            Queue::new(id.clone(), 0, 10),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "visibility_timeout"
        ));
        assert!(matches!(
            Queue::new(id, 30, 0),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "max_batch"
        ));
    }

    #[test]
    fn test_queue_accessors() {
        let queue = orders_queue();
        assert_eq!(queue.queue_id().as_str(), "orders");
        assert_eq!(queue.visibility_timeout_secs(), 30);
        assert_eq!(queue.visibility_timeout(), Duration::seconds(30));
        assert_eq!(queue.max_batch(), 10);
    }
}

mod lifecycle {
    use super::*;

    /// Verify create_queue sends the broker's wire shape.
    #[tokio::test]
    async fn test_create_queue_request_shape() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/queue/new"))
            .and(body_json(json!({
                "readTimeout": 30,
                "maxBatch": 10,
                "queueId": "orders"
            })))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "data": "0b9e7c1a-2d8f-4a57-9a0c-3f1f0c7d9e21",
                "error": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).create_queue(&orders_queue()).await.unwrap();
        assert_eq!(
            response.data(),
            &json!("0b9e7c1a-2d8f-4a57-9a0c-3f1f0c7d9e21")
        );
    }

    #[tokio::test]
    async fn test_create_queue_conflict() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/queue/new"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "data": null,
                "error": "A queue with id orders already exists"
            })))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .create_queue(&orders_queue())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            RqsError::Conflict {
                resource: ResourceKind::Queue,
                ref id,
                ..
            } if id == "orders"
        ));
    }

    #[tokio::test]
    async fn test_list_queues() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/queue/list"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "data": ["orders", "invoices"],
                "error": null
            })))
            .mount(&server)
            .await;

        let queues = client_for(&server).list_queues().await.unwrap();
        assert_eq!(
            queues,
            vec![
                QueueId::new("orders").unwrap(),
                QueueId::new("invoices").unwrap()
            ]
        );
    }

    #[tokio::test]
    async fn test_list_queues_rejects_invalid_ids() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/queue/list"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "data": ["orders", ""],
                "error": null
            })))
            .mount(&server)
            .await;

        let error = client_for(&server).list_queues().await.unwrap_err();
        assert!(matches!(
            error,
            RqsError::InvalidResponse {
                operation: Operation::ListQueues,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_ensure_queue_skips_existing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/queue/list"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "data": ["orders"],
                "error": null
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/queue/new"))
            .respond_with(ResponseTemplate::new(202))
            .expect(0)
            .mount(&server)
            .await;

        let created = client_for(&server).ensure_queue(&orders_queue()).await.unwrap();
        assert!(!created);
    }

    #[tokio::test]
    async fn test_ensure_queue_creates_missing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/queue/list"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "data": [],
                "error": null
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/queue/new"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "data": "uuid",
                "error": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = client_for(&server).ensure_queue(&orders_queue()).await.unwrap();
        assert!(created);
    }
}
