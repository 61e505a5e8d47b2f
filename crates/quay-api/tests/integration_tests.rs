//! # Integration Tests for quay-api
//!
//! Drives the assembled router with `oneshot` requests against a
//! `MockTransport`: route derivation, request validation, middleware
//! rejection, synchronous and background publishing, and health probes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use quay_api::{require_identity_header, RouteOptions, Server};
use quay_bus::{BridgeError, Bus, MockTransport, RecordingObserver};
use quay_schema::CompiledSchema;

struct Harness {
    server: Server,
    transport: Arc<MockTransport>,
    observer: RecordingObserver,
}

/// Helper: a server over a mock transport with a recording observer.
fn harness() -> Harness {
    let transport = Arc::new(MockTransport::new());
    let observer = RecordingObserver::new();
    let bus = Bus::with_observer(transport.clone(), Arc::new(observer.clone()));
    Harness {
        server: Server::new(bus),
        transport,
        observer,
    }
}

fn test_schema() -> Value {
    json!({
        "type": "record", "name": "test", "namespace": "api",
        "fields": [{"name": "id", "type": "string"}]
    })
}

fn person_schema(name: &str) -> Value {
    json!({
        "type": "record", "name": name, "namespace": "com.example",
        "fields": [
            {"name": "value", "type": "string"},
            {"name": "age", "type": "int"}
        ]
    })
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

/// Helper: read response body as JSON.
async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Helper: wait for a background publish to reach the transport.
async fn wait_for_publishes(transport: &MockTransport, count: usize) {
    for _ in 0..100 {
        if transport.published().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {count} publishes, saw {}",
        transport.published().len()
    );
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let h = harness();
    let response = quay_api::app(&h.server)
        .oneshot(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let h = harness();
    let response = quay_api::app(&h.server)
        .oneshot(
            Request::builder()
                .uri("/health/readiness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

// -- Publish Path -------------------------------------------------------------

#[tokio::test]
async fn test_valid_body_published_under_full_schema_name() {
    let mut h = harness();
    h.server
        .add_route(RouteOptions::new(test_schema()).synchronous(true))
        .unwrap();

    let response = quay_api::app(&h.server)
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"success": true}));

    let published = h.transport.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].options.event_name, "api.test");
    assert_eq!(published[0].options.message, json!({"id": "abc"}));
    assert_eq!(published[0].options.context, json!({}));
}

#[tokio::test]
async fn test_published_buffer_decodes_with_route_schema() {
    let mut h = harness();
    h.server
        .add_route(RouteOptions::new(test_schema()).synchronous(true))
        .unwrap();
    quay_api::app(&h.server)
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();

    let buffer = h.transport.published()[0].buffer.clone();
    let schema = CompiledSchema::new(test_schema()).unwrap();
    let decoded = quay_envelope::EnvelopeCodec::new()
        .decode(&schema, &buffer)
        .unwrap();
    assert_eq!(decoded.message, json!({"id": "abc"}));
    assert_eq!(decoded.context, json!({}));
}

#[tokio::test]
async fn test_background_publish_answers_before_transport() {
    let mut h = harness();
    h.server.add_route(RouteOptions::new(test_schema())).unwrap();

    let response = quay_api::app(&h.server)
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"success": true}));
    wait_for_publishes(&h.transport, 1).await;
}

#[tokio::test]
async fn test_invalid_body_lists_every_violation() {
    let mut h = harness();
    h.server
        .add_route(RouteOptions::new(person_schema("FullName")))
        .unwrap();

    let response = quay_api::app(&h.server)
        .oneshot(post("/com/example/FullName", r#"{"value": 5}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": [
            "value: expected string, got number",
            "age: missing required field"
        ]})
    );
    assert!(h.transport.published().is_empty());
    assert!(matches!(
        h.observer.errors().as_slice(),
        [BridgeError::Validation(_)]
    ));
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let mut h = harness();
    h.server.add_route(RouteOptions::new(test_schema())).unwrap();

    let response = quay_api::app(&h.server)
        .oneshot(post("/api/test", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("request body is not valid JSON"), "{message}");
}

#[tokio::test]
async fn test_empty_body_is_empty_object() {
    let mut h = harness();
    let schema = json!({
        "type": "record", "name": "ping", "namespace": "api",
        "fields": [{"name": "note", "type": ["null", "string"], "default": null}]
    });
    h.server
        .add_route(RouteOptions::new(schema).synchronous(true))
        .unwrap();

    let response = quay_api::app(&h.server)
        .oneshot(post("/api/ping", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.transport.published()[0].options.message, json!({}));
}

#[tokio::test]
async fn test_synchronous_transport_failure_is_400() {
    let mut h = harness();
    h.server
        .add_route(RouteOptions::new(test_schema()).synchronous(true))
        .unwrap();
    h.transport.reject_publishes("queue full");

    let response = quay_api::app(&h.server)
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({"error": "publish of 'api.test' failed: transport rejected the operation: queue full"})
    );
}

#[tokio::test]
async fn test_background_transport_failure_only_observed() {
    let mut h = harness();
    h.server.add_route(RouteOptions::new(test_schema())).unwrap();
    h.transport.reject_publishes("queue full");

    let response = quay_api::app(&h.server)
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    for _ in 0..100 {
        if !h.observer.errors().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(
        h.observer.errors().as_slice(),
        [BridgeError::Publish { .. }]
    ));
}

#[tokio::test]
async fn test_event_name_override() {
    let mut h = harness();
    h.server
        .add_route(
            RouteOptions::new(test_schema())
                .event_name("tests.created")
                .synchronous(true),
        )
        .unwrap();
    quay_api::app(&h.server)
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(h.transport.published()[0].options.event_name, "tests.created");
}

// -- Route Derivation ---------------------------------------------------------

#[tokio::test]
async fn test_namespace_derivation_and_grouping() {
    let mut h = harness();
    h.server
        .add_route(RouteOptions::new(person_schema("FullName")).synchronous(true))
        .unwrap();
    h.server
        .add_route(RouteOptions::new(person_schema("Surname")).synchronous(true))
        .unwrap();

    let node = h.server.node("/com/example").unwrap();
    assert!(node.route("FullName").is_some());
    assert!(node.route("Surname").is_some());

    let app = quay_api::app(&h.server);
    for path in ["/com/example/FullName", "/com/example/Surname"] {
        let response = app
            .clone()
            .oneshot(post(path, r#"{"value":"x","age":3}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
    let events: Vec<String> = h
        .transport
        .published()
        .into_iter()
        .map(|p| p.options.event_name)
        .collect();
    assert_eq!(events, ["com.example.FullName", "com.example.Surname"]);
}

#[tokio::test]
async fn test_endpoint_override_without_namespace() {
    let mut h = harness();
    let schema = json!({
        "type": "record", "name": "test",
        "fields": [{"name": "id", "type": "string"}]
    });
    h.server
        .add_route(RouteOptions::new(schema).endpoint("/api/v1.0"))
        .unwrap();

    let response = quay_api::app(&h.server)
        .oneshot(post("/api/v1.0/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_method_is_enforced() {
    let mut h = harness();
    h.server
        .add_route(RouteOptions::new(test_schema()).method("PUT"))
        .unwrap();
    let app = quay_api::app(&h.server);

    let response = app
        .clone()
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/test")
                .body(Body::from(r#"{"id":"abc"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let mut h = harness();
    h.server.add_route(RouteOptions::new(test_schema())).unwrap();
    let response = quay_api::app(&h.server)
        .oneshot(post("/api/other", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Middleware ---------------------------------------------------------------

#[tokio::test]
async fn test_identity_header_required() {
    let mut h = harness();
    h.server
        .add_route(
            RouteOptions::new(test_schema())
                .middleware(require_identity_header("x-identity"))
                .synchronous(true),
        )
        .unwrap();

    let response = quay_api::app(&h.server)
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert!(h.transport.published().is_empty());
}

#[tokio::test]
async fn test_identity_becomes_context() {
    let mut h = harness();
    h.server
        .add_route(
            RouteOptions::new(test_schema())
                .middleware(require_identity_header("x-identity"))
                .synchronous(true),
        )
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/test")
        .header("x-identity", "alice")
        .body(Body::from(r#"{"id":"abc"}"#))
        .unwrap();
    let response = quay_api::app(&h.server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        h.transport.published()[0].options.context,
        json!({"identity": "alice"})
    );
}

#[tokio::test]
async fn test_node_middleware_applies_to_every_route_on_node() {
    let mut h = harness();
    h.server
        .add_route(
            RouteOptions::new(person_schema("FullName"))
                .middleware(require_identity_header("x-identity")),
        )
        .unwrap();
    h.server
        .add_route(RouteOptions::new(person_schema("Surname")))
        .unwrap();

    let response = quay_api::app(&h.server)
        .oneshot(post("/com/example/Surname", r#"{"value":"x","age":3}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// -- Response Writers and Limits ---------------------------------------------

#[tokio::test]
async fn test_custom_response_writer() {
    let mut h = harness();
    let writer: quay_api::ResponseWriter = Arc::new(|outcome: quay_api::RouteOutcome| match outcome {
        Ok(_) => StatusCode::ACCEPTED.into_response(),
        Err(_) => StatusCode::UNPROCESSABLE_ENTITY.into_response(),
    });
    h.server
        .add_route(RouteOptions::new(test_schema()).response_writer(writer))
        .unwrap();
    let app = quay_api::app(&h.server);

    let ok = app
        .clone()
        .oneshot(post("/api/test", r#"{"id":"abc"}"#))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::ACCEPTED);

    let bad = app.oneshot(post("/api/test", r#"{"id":1}"#)).await.unwrap();
    assert_eq!(bad.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_body_limit_enforced() {
    let mut h = harness();
    h.server = h.server.with_body_limit(16);
    h.server.add_route(RouteOptions::new(test_schema())).unwrap();

    let body = json!({"id": "x".repeat(64)}).to_string();
    let response = quay_api::app(&h.server)
        .oneshot(post("/api/test", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
