//! Relay behaviour against a mocked analysis service.

use analysis_relay::{router, RelayConfig, RELAY_PATH};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_bytes, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOUNDARY_TYPE: &str = "multipart/form-data; boundary=----relaytest";
const MULTIPART_BODY: &[u8] = b"------relaytest\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"a.pdf\"\r\n\
Content-Type: application/pdf\r\n\r\n%PDF-1.4 fake\r\n------relaytest--\r\n";

fn relay_to(target_url: String) -> Router {
    let config = RelayConfig::from_lookup(|key| match key {
        "RELAY_TARGET_URL" => Some(target_url.clone()),
        "RELAY_COOKIE" => Some("session=test-cookie".to_string()),
        "RELAY_TIMEOUT_SECS" => Some("5".to_string()),
        _ => None,
    })
    .unwrap();
    router(config).unwrap()
}

fn upload_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(RELAY_PATH)
        .header(header::ORIGIN, "https://app.example")
        .header(header::CONTENT_TYPE, BOUNDARY_TYPE)
        .body(Body::from(MULTIPART_BODY))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn forwards_body_cookie_and_content_type() {
    let upstream = MockServer::start().await;
    let answer = json!({"success": true, "data": {"full_markdown": "# Invoice"}});
    Mock::given(method("POST"))
        .and(path("/analysis"))
        .and(header_eq("cookie", "session=test-cookie"))
        .and(header_eq("content-type", BOUNDARY_TYPE))
        .and(body_bytes(MULTIPART_BODY))
        .respond_with(ResponseTemplate::new(200).set_body_json(&answer))
        .expect(1)
        .mount(&upstream)
        .await;

    let response = relay_to(format!("{}/analysis", upstream.uri()))
        .oneshot(upload_request())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert_eq!(json_body(response).await, answer);
}

#[tokio::test]
async fn upstream_status_and_body_pass_through() {
    let upstream = MockServer::start().await;
    let answer = json!({"success": false, "message": "unsupported file"});
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(&answer))
        .mount(&upstream)
        .await;

    let response = relay_to(upstream.uri()).oneshot(upload_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await, answer);
}

#[tokio::test]
async fn non_json_upstream_is_internal_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&upstream)
        .await;

    let response = relay_to(upstream.uri()).oneshot(upload_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert!(body["message"].as_str().unwrap().contains("not JSON"));
}

#[tokio::test]
async fn unreachable_upstream_is_internal_error() {
    let response = relay_to("http://127.0.0.1:9/analysis".to_string())
        .oneshot(upload_request())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn other_methods_are_rejected() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(RELAY_PATH)
        .body(Body::empty())
        .unwrap();
    let response = relay_to(upstream.uri()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(response).await, json!({"error": "Method not allowed"}));
}

#[tokio::test]
async fn preflight_allows_post_from_any_origin() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri(RELAY_PATH)
        .header(header::ORIGIN, "https://app.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = relay_to("http://127.0.0.1:9/analysis".to_string())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST"), "{methods}");
    assert!(methods.contains("OPTIONS"), "{methods}");
}

#[tokio::test]
async fn bare_options_is_ok() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri(RELAY_PATH)
        .body(Body::empty())
        .unwrap();
    let response = relay_to("http://127.0.0.1:9/analysis".to_string())
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
