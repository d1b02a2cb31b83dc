mod common;

use std::time::Duration;

use axum::body::{Body, Bytes};
use futures::StreamExt;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use simple_signer::engine::DocumentEngine;
use simple_signer::{AppState, EnvelopeEngine, RequestHandler, router};

use common::{CERT_NAME, SUBJECT, ScriptedEngine, test_context};

const BOUNDARY: &str = "X-SIGNER-TEST-BOUNDARY";

fn state(engine: impl DocumentEngine + 'static, deadline: Duration) -> AppState {
    AppState {
        handler: RequestHandler::new(test_context(engine), deadline),
        max_body_bytes: 1024 * 1024,
    }
}

fn scripted() -> AppState {
    state(ScriptedEngine::new(), Duration::from_secs(10))
}

fn multipart(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        if *name == "file" {
            body.extend_from_slice(
                b"Content-Disposition: form-data; name=\"file\"; filename=\"doc.bin\"\r\n\
                  Content-Type: application/octet-stream\r\n\r\n",
            );
        } else {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
        }
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn sign_request(cert: &str, parts: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/sign/{cert}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart(parts)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_returns_envelope() {
    let response = router(scripted())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"], "healthy");
    assert!(body.get("message").is_none());
}

#[tokio::test]
async fn index_returns_welcome() {
    let response = router(scripted())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert!(body["data"].as_str().unwrap().contains("/sign/"));
}

#[tokio::test]
async fn sign_returns_document_bytes() {
    let response = router(scripted())
        .oneshot(sign_request(CERT_NAME, &[("file", b"hello")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-scripted"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("hello"));
    assert!(text.contains(&format!("#field 2 {SUBJECT}")));
}

#[tokio::test]
async fn sign_with_envelope_engine() {
    let response = router(state(EnvelopeEngine, Duration::from_secs(10)))
        .oneshot(sign_request(CERT_NAME, &[("file", b"payload"), ("password", b"pw")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let doc = simple_signer::engine::EnvelopeDocument::parse(body.to_vec()).unwrap();
    assert!(simple_signer::Document::is_protected(&doc));
    assert_eq!(doc.fields().len(), 2);
}

#[tokio::test]
async fn request_props_override_defaults() {
    let props = br#"{"coords": [{"pages": [3], "x1": 0, "y1": 0, "x2": 10, "y2": 10}]}"#;
    let response = router(scripted())
        .oneshot(sign_request(CERT_NAME, &[("props", props), ("file", b"doc")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("#field 3"));
    assert!(!text.contains("#field 1"));
}

#[tokio::test]
async fn password_field_locks_document() {
    let response = router(scripted())
        .oneshot(sign_request(CERT_NAME, &[("file", b"doc"), ("password", b"pw")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.starts_with(b"PROTECTED:pw\n"));
}

#[tokio::test]
async fn unknown_certificate_returns_400() {
    let response = router(scripted())
        .oneshot(sign_request("bob", &[("file", b"doc")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(
        body["message"],
        "Error processing document: unknown certificate 'bob'"
    );
}

#[tokio::test]
async fn missing_file_returns_400() {
    let response = router(scripted())
        .oneshot(sign_request(CERT_NAME, &[("password", b"pw")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["message"], "Invalid file in the `file` field.");
}

#[tokio::test]
async fn invalid_props_return_400() {
    let props = br##"{"style": {"fontColor": "#12345"}}"##;
    let response = router(scripted())
        .oneshot(sign_request(CERT_NAME, &[("file", b"doc"), ("props", props)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Error reading JSON `props`")
    );
}

#[tokio::test]
async fn already_protected_returns_400() {
    let response = router(scripted())
        .oneshot(sign_request(
            CERT_NAME,
            &[("file", b"PROTECTED:old\ndoc"), ("password", b"new")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signing_failure_returns_500() {
    let response = router(scripted())
        .oneshot(sign_request(CERT_NAME, &[("file", b"FAIL-SIGN")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn non_multipart_body_returns_400() {
    let response = router(scripted())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/sign/{CERT_NAME}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn slow_engine_times_out_with_503() {
    let app = router(state(
        ScriptedEngine::with_delay(Duration::from_millis(500)),
        Duration::from_millis(50),
    ));
    let response = app
        .oneshot(sign_request(CERT_NAME, &[("file", b"doc")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn slow_upload_counts_against_the_deadline() {
    let engine = ScriptedEngine::new();
    let app = router(state(engine.clone(), Duration::from_millis(100)));

    let body = multipart(&[("file", b"doc")]);
    let (head, tail) = body.split_at(body.len() / 2);
    let head = Bytes::copy_from_slice(head);
    let tail = Bytes::copy_from_slice(tail);
    let stream = futures::stream::iter([head])
        .chain(futures::stream::once(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            tail
        }))
        .map(Ok::<_, std::io::Error>);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/sign/{CERT_NAME}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from_stream(stream))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(engine.open_count(), 0);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = router(scripted())
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
