//! Gateway behavior: allow-listing, credential checks, body validation,
//! and verbatim relay of upstream responses.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hookcache::config::ProxyConfig;
use hookcache::proxy::build_router;

const TEST_KEY: &str = "testkeytestkeytestkey";

fn router(upstream: &str) -> Router {
    build_router(&ProxyConfig {
        port: 0,
        upstream_base_url: upstream.to_string(),
    })
    .expect("router builds")
}

fn basic_auth() -> String {
    format!("Basic {}", BASE64.encode(format!("{TEST_KEY}:x")))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

#[tokio::test]
async fn rejects_paths_off_the_allow_list() {
    let app = router("http://unused.invalid");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/subscribers.json")
                .header(header::AUTHORIZATION, basic_auth())
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Path not allowed");
}

#[tokio::test]
async fn rejects_missing_credentials() {
    let app = router("http://unused.invalid");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/clients.json")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "API key required");
}

#[tokio::test]
async fn rejects_implausible_api_keys() {
    let app = router("http://unused.invalid");
    let short = format!("Basic {}", BASE64.encode("tiny:x"));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/clients.json")
                .header(header::AUTHORIZATION, short)
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid API key format");
}

#[tokio::test]
async fn rejects_unparseable_write_bodies() {
    let app = router("http://unused.invalid");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/lists/l1/webhooks.json")
                .header(header::AUTHORIZATION, basic_auth())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid JSON in request body");
}

#[tokio::test]
async fn rejects_invalid_webhook_payloads_with_every_violation() {
    let app = router("http://unused.invalid");
    let payload = json!({ "Url": "http://insecure.example.com" });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/lists/l1/webhooks.json")
                .header(header::AUTHORIZATION, basic_auth())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await["error"]
        .as_str()
        .expect("error string")
        .to_string();
    assert!(error.contains("URL must be HTTPS"));
    assert!(error.contains("event type is required"));
    assert!(error.contains("json or xml"));
}

#[tokio::test]
async fn forwards_allowed_requests_with_injected_credentials() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients.json"))
        .and(header_matcher("Authorization", basic_auth().as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "ClientID": "c1", "Name": "Acme" }])),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let app = router(&upstream.uri());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/clients.json")
                .header(header::AUTHORIZATION, basic_auth())
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["ClientID"], "c1");
}

#[tokio::test]
async fn relays_upstream_status_codes_verbatim() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/clients.json"))
        .respond_with(
            ResponseTemplate::new(502).set_body_json(json!({ "Message": "upstream down" })),
        )
        .mount(&upstream)
        .await;

    let app = router(&upstream.uri());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/clients.json")
                .header(header::AUTHORIZATION, basic_auth())
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["Message"], "upstream down");
}

#[tokio::test]
async fn forwards_valid_webhook_creation_bodies() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lists/l1/webhooks.json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!("wh-new-1")))
        .expect(1)
        .mount(&upstream)
        .await;

    let payload = json!({
        "Url": "https://example.com/hook",
        "Events": ["Subscribe", "Deactivate"],
        "PayloadFormat": "json"
    });

    let app = router(&upstream.uri());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/lists/l1/webhooks.json")
                .header(header::AUTHORIZATION, basic_auth())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await, json!("wh-new-1"));
}

#[tokio::test]
async fn answers_500_when_upstream_is_unreachable() {
    // Nothing is listening on this port.
    let app = router("http://127.0.0.1:9");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/clients.json")
                .header(header::AUTHORIZATION, basic_auth())
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Internal server error");
}

#[tokio::test]
async fn health_endpoint_reports_version() {
    let app = router("http://unused.invalid");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("handler runs");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}
