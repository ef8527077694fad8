//! Tests for the client handle and shared request plumbing.

use super::*;
use crate::transport::HttpMethod;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;

// ============================================================================
// Recording Transport for Testing
// ============================================================================

/// Replies with a canned response and remembers every request.
#[derive(Clone)]
struct RecordingTransport {
    response: TransportResponse,
    requests: Arc<Mutex<Vec<TransportRequest>>>,
}

impl RecordingTransport {
    fn replying(status: u16, body: Value) -> Self {
        Self {
            response: TransportResponse::new(status, body),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.response.clone())
    }
}

struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
        Err(TransportError::ConnectionFailed {
            message: "connection refused".to_string(),
        })
    }
}

mod configuration {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("rqs-client/"));
        assert!(config.validate_routing);
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::default()
            .with_base_url("http://broker:9000")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("orders-service/1.0")
            .with_validate_routing(false);

        assert_eq!(config.base_url, "http://broker:9000");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "orders-service/1.0");
        assert!(!config.validate_routing);
    }

    #[test]
    fn test_builder_rejects_invalid_base_url() {
        let result = RqsClient::builder()
            .config(ClientConfig::default().with_base_url("not a url"))
            .build();

        assert!(matches!(
            result,
            Err(RqsError::Transport(TransportError::InvalidRequest { .. }))
        ));
    }

    #[test]
    fn test_builder_with_custom_transport_skips_http() {
        let transport = RecordingTransport::replying(200, json!({"data": [], "error": null}));
        let client = RqsClient::builder()
            .config(ClientConfig::default().with_base_url("not a url"))
            .transport(transport)
            .build();

        assert!(client.is_ok());
    }

    #[test]
    fn test_debug_hides_transport() {
        let client = RqsClient::with_transport(FailingTransport, ClientConfig::default());
        let rendered = format!("{:?}", client);

        assert!(rendered.contains("<Transport>"));
        assert!(rendered.contains("127.0.0.1"));
    }
}

mod requests {
    use super::*;

    /// The per-call deadline travels with every request of the derived client only.
    #[tokio::test]
    async fn test_with_deadline_attaches_deadline() {
        let transport = RecordingTransport::replying(200, json!({"data": [], "error": null}));
        let client = RqsClient::with_transport(transport.clone(), ClientConfig::default());
        let bounded = client.with_deadline(Duration::from_millis(250));

        bounded
            .list_resources(ResourceKind::Queue, "/queue/list")
            .await
            .unwrap();
        client
            .list_resources(ResourceKind::Queue, "/queue/list")
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].deadline, Some(Duration::from_millis(250)));
        assert_eq!(requests[1].deadline, None);
        assert_eq!(bounded.deadline(), Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_create_resource_maps_conflict() {
        let body = json!({"data": null, "error": "An exchange with id fan already exists"});
        let transport = RecordingTransport::replying(409, body.clone());
        let client = RqsClient::with_transport(transport, ClientConfig::default());

        let error = client
            .create_resource(ResourceKind::Exchange, "fan", "/exchange/new", json!({}))
            .await
            .unwrap_err();

        match error {
            RqsError::Conflict {
                resource,
                id,
                body: returned,
            } => {
                assert_eq!(resource, ResourceKind::Exchange);
                assert_eq!(id, "fan");
                assert_eq!(returned, body);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_resource_maps_other_failures() {
        let transport = RecordingTransport::replying(400, json!("JSON was malformed"));
        let client = RqsClient::with_transport(transport, ClientConfig::default());

        let error = client
            .create_resource(ResourceKind::Queue, "orders", "/queue/new", json!({}))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            RqsError::CreateFailed { status: 400, .. }
        ));
        assert_eq!(error.body(), Some(&json!("JSON was malformed")));
    }

    #[tokio::test]
    async fn test_create_resource_returns_data() {
        let transport = RecordingTransport::replying(202, json!({"data": "5f6c", "error": null}));
        let client = RqsClient::with_transport(transport.clone(), ClientConfig::default());

        let response = client
            .create_resource(
                ResourceKind::Queue,
                "orders",
                "/queue/new",
                json!({"queueId": "orders"}),
            )
            .await
            .unwrap();

        assert_eq!(response.data(), &json!("5f6c"));
        let requests = transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].body, Some(json!({"queueId": "orders"})));
    }

    #[tokio::test]
    async fn test_list_resources_maps_failure() {
        let transport = RecordingTransport::replying(500, json!({"data": null, "error": "down"}));
        let client = RqsClient::with_transport(transport, ClientConfig::default());

        let error = client
            .list_resources(ResourceKind::Exchange, "/exchange/list")
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            RqsError::ListFailed {
                resource: ResourceKind::Exchange,
                status: 500,
                ..
            }
        ));
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn test_transport_failure_is_propagated() {
        let client = RqsClient::with_transport(FailingTransport, ClientConfig::default());

        let error = client
            .list_resources(ResourceKind::Queue, "/queue/list")
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            RqsError::Transport(TransportError::ConnectionFailed { .. })
        ));
        assert!(error.is_transient());
    }
}
