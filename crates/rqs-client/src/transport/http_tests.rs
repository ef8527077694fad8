//! Tests for the HTTP transport.

use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::new(&server.uri(), Duration::from_secs(5), "rqs-client/test").unwrap()
}

#[test]
fn test_new_rejects_invalid_base_url() {
    let result = HttpTransport::new("broker:8080/api", Duration::from_secs(5), "ua");
    assert!(matches!(result, Err(TransportError::InvalidRequest { .. })));

    let result = HttpTransport::new("", Duration::from_secs(5), "ua");
    assert!(matches!(result, Err(TransportError::InvalidRequest { .. })));
}

#[test]
fn test_base_url_trailing_slash_is_trimmed() {
    let transport =
        HttpTransport::new("http://127.0.0.1:8080/", Duration::from_secs(5), "ua").unwrap();
    assert_eq!(transport.base_url(), "http://127.0.0.1:8080");
}

#[tokio::test]
async fn test_get_sends_query_and_user_agent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/message/get"))
        .and(query_param("queueId", "orders"))
        .and(header("user-agent", "rqs-client/test"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "data": {"messageId": "order-1", "content": "hello", "uuid": "t-1"},
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport_for(&server)
        .send(TransportRequest::get("/message/get").with_query("queueId", "orders"))
        .await
        .unwrap();

    assert_eq!(response.status, 202);
    assert_eq!(response.body["data"]["uuid"], "t-1");
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    let body = json!({"queueId": "orders", "messageUuid": "t-1"});

    Mock::given(method("POST"))
        .and(path("/message/delete"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "data": "Successfully deleted uuid t-1",
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport_for(&server)
        .send(TransportRequest::post("/message/delete", body))
        .await
        .unwrap();

    assert_eq!(response.status, 202);
    assert!(!response.is_error());
}

/// Error statuses are responses, not transport failures.
#[tokio::test]
async fn test_error_status_is_returned_as_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/exchange/new"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "data": null,
            "error": "An exchange with id fan already exists"
        })))
        .mount(&server)
        .await;

    let response = transport_for(&server)
        .send(TransportRequest::post("/exchange/new", json!({"id": "fan"})))
        .await
        .unwrap();

    assert_eq!(response.status, 409);
    assert!(response.is_error());
    assert_eq!(
        response.body["error"],
        "An exchange with id fan already exists"
    );
}

#[tokio::test]
async fn test_plain_text_body_is_kept_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/queue/new"))
        .respond_with(ResponseTemplate::new(400).set_body_string("JSON was malformed"))
        .mount(&server)
        .await;

    let response = transport_for(&server)
        .send(TransportRequest::post("/queue/new", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status, 400);
    assert_eq!(response.body, Value::String("JSON was malformed".to_string()));
}

#[tokio::test]
async fn test_empty_body_is_null() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/queue/list"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let response = transport_for(&server)
        .send(TransportRequest::get("/queue/list"))
        .await
        .unwrap();

    assert_eq!(response.body, Value::Null);
}

#[tokio::test]
async fn test_deadline_overrides_default_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/queue/list"))
        .respond_with(
            ResponseTemplate::new(202)
                .set_body_json(json!({"data": [], "error": null}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let result = transport_for(&server)
        .send(TransportRequest::get("/queue/list").with_deadline(Some(Duration::from_millis(50))))
        .await;

    assert!(matches!(result, Err(TransportError::Timeout { .. })));
}

#[tokio::test]
async fn test_unreachable_broker_is_transient_failure() {
    let transport =
        HttpTransport::new("http://127.0.0.1:1", Duration::from_secs(2), "ua").unwrap();

    let error = transport
        .send(TransportRequest::get("/queue/list"))
        .await
        .unwrap_err();

    assert!(error.is_transient());
}

#[test]
fn test_parse_body() {
    assert_eq!(parse_body(""), Value::Null);
    assert_eq!(parse_body("  "), Value::Null);
    assert_eq!(parse_body("{\"data\": 1}"), json!({"data": 1}));
    assert_eq!(parse_body("oops"), json!("oops"));
}
