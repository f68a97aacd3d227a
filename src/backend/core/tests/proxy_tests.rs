//! Integration tests for the request execution proxy, backed by wiremock.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courier_core::proxy::{
    AuthType, BodyType, KeyValue, RequestAuth, RequestBody, RequestExecutor, RequestSpec,
};

fn executor() -> RequestExecutor {
    RequestExecutor::new(5)
}

fn spec(method: &str, url: String) -> RequestSpec {
    RequestSpec {
        method: method.to_string(),
        url,
        headers: Vec::new(),
        params: Vec::new(),
        body: RequestBody::default(),
        auth: RequestAuth::default(),
    }
}

fn kv(key: &str, value: &str, enabled: bool) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: value.to_string(),
        enabled,
    }
}

#[tokio::test]
async fn forwards_enabled_params_and_skips_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = spec("GET", format!("{}/items", server.uri()));
    spec.params = vec![kv("page", "2", true), kv("debug", "1", false)];

    let result = executor().execute(&spec).await;

    assert_eq!(result.status, 200);
    assert_eq!(result.body, json!({"ok": true}));

    // The disabled param must not have reached the upstream.
    let received = &server.received_requests().await.unwrap()[0];
    assert!(!received.url.query().unwrap_or("").contains("debug"));
}

#[tokio::test]
async fn duplicate_keys_are_last_write_wins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("env", "prod"))
        .and(header("X-Trace", "second"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = spec("GET", server.uri());
    spec.params = vec![kv("env", "staging", true), kv("env", "prod", true)];
    spec.headers = vec![kv("X-Trace", "first", true), kv("X-Trace", "second", true)];

    let result = executor().execute(&spec).await;
    assert_eq!(result.status, 204);
}

#[tokio::test]
async fn bearer_auth_overwrites_explicit_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer from-auth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = spec("GET", server.uri());
    spec.headers = vec![kv("Authorization", "Bearer from-header", true)];
    spec.auth = RequestAuth {
        auth_type: AuthType::Bearer,
        token: Some("from-auth".to_string()),
        ..Default::default()
    };

    let result = executor().execute(&spec).await;
    assert_eq!(result.status, 200);
}

#[tokio::test]
async fn apikey_auth_sets_the_named_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("X-Api-Key", "secret-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = spec("GET", server.uri());
    spec.auth = RequestAuth {
        auth_type: AuthType::Apikey,
        key: Some("X-Api-Key".to_string()),
        value: Some("secret-key".to_string()),
        ..Default::default()
    };

    let result = executor().execute(&spec).await;
    assert_eq!(result.status, 200);
}

#[tokio::test]
async fn json_body_is_parsed_and_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({"name": "widget", "qty": 3})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = spec("POST", server.uri());
    spec.body = RequestBody {
        body_type: BodyType::Json,
        content: r#"{"name": "widget", "qty": 3}"#.to_string(),
    };

    let result = executor().execute(&spec).await;
    assert_eq!(result.status, 201);
    assert_eq!(result.body, json!({"id": 7}));
}

#[tokio::test]
async fn malformed_json_body_is_dropped_but_request_proceeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = spec("POST", server.uri());
    spec.body = RequestBody {
        body_type: BodyType::Json,
        content: "{not json".to_string(),
    };

    let result = executor().execute(&spec).await;

    // The call still goes out, bodyless, and the upstream status comes back.
    assert_eq!(result.status, 200);
    let received = &server.received_requests().await.unwrap()[0];
    assert!(received.body.is_empty());
}

#[tokio::test]
async fn non_json_response_body_comes_back_as_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("plain text")
                .insert_header("X-Request-Id", "abc-123"),
        )
        .mount(&server)
        .await;

    let result = executor().execute(&spec("GET", server.uri())).await;

    assert_eq!(result.status, 200);
    assert_eq!(result.body, json!("plain text"));
    assert_eq!(result.size, "10 B");
    // Header names come back lowercased by the transport.
    assert_eq!(result.headers.get("x-request-id").map(String::as_str), Some("abc-123"));
}

#[tokio::test]
async fn unreachable_host_yields_the_zero_envelope() {
    // Reserved TEST-NET address, nothing listens there.
    let mut spec = spec("GET", "http://192.0.2.1:9/".to_string());
    spec.params = vec![kv("q", "x", true)];

    let result = RequestExecutor::new(1).execute(&spec).await;

    assert_eq!(result.status, 0);
    assert_eq!(result.status_text, "Error");
    assert_eq!(result.time, 0);
    assert_eq!(result.size, "0 B");
    assert!(result.headers.is_empty());
    assert!(result.body.get("error").is_some());
}

#[tokio::test]
async fn invalid_method_yields_the_zero_envelope() {
    let result = executor()
        .execute(&spec("NOT A METHOD", "http://localhost/".to_string()))
        .await;

    assert_eq!(result.status, 0);
    assert_eq!(result.status_text, "Error");
}

#[tokio::test]
async fn upstream_error_status_is_reported_not_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "down"})))
        .mount(&server)
        .await;

    let result = executor().execute(&spec("DELETE", server.uri())).await;

    // Upstream failures are payload, not proxy errors.
    assert_eq!(result.status, 503);
    assert_eq!(result.body, json!({"detail": "down"}));
}
