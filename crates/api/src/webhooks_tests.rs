//! Router tests driven through `tower::ServiceExt::oneshot`.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::signature::{sign, SIGNATURE_HEADER};
use crate::{router, AppState, EventName};

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header(SIGNATURE_HEADER, sig);
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn signed_delivery_is_accepted_and_forwarded() {
    let (state, mut rx) = AppState::new(Some("s3cret".into()), 8);
    let body = json!({ "event": "invoice.created", "data": { "id": 12 } }).to_string();
    let signature = sign(b"s3cret", body.as_bytes());

    let response = router(state)
        .oneshot(webhook_request(&body, Some(&signature)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let record = json_body(response).await;
    assert_eq!(record["event"], "invoice.created");
    assert_eq!(record["resource"], "invoice");
    assert_eq!(record["signature_verified"], true);

    let forwarded = rx.recv().await.unwrap();
    assert_eq!(forwarded.event, EventName::InvoiceCreated);
    assert_eq!(forwarded.data["id"], 12);
}

#[tokio::test]
async fn wrong_or_missing_signature_is_unauthorized() {
    let body = json!({ "event": "contact.created", "data": {} }).to_string();

    let (state, mut rx) = AppState::new(Some("s3cret".into()), 8);
    let bad = sign(b"guess", body.as_bytes());
    let response = router(state.clone())
        .oneshot(webhook_request(&body, Some(&bad)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router(state).oneshot(webhook_request(&body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "missing signature header");

    assert!(rx.try_recv().is_err(), "rejected deliveries must not be forwarded");
}

#[tokio::test]
async fn unsigned_delivery_is_accepted_without_a_secret() {
    let (state, _rx) = AppState::new(None, 8);
    let body = json!({ "event": "catalog.updated", "data": { "id": 3 } }).to_string();

    let response = router(state).oneshot(webhook_request(&body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(response).await["signature_verified"], false);
}

#[tokio::test]
async fn unknown_event_is_a_bad_request() {
    let (state, _rx) = AppState::new(None, 8);
    let body = json!({ "event": "payroll.run" }).to_string();

    let response = router(state).oneshot(webhook_request(&body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "unknown event 'payroll.run'");
}

#[tokio::test]
async fn health_reports_ok() {
    let (state, _rx) = AppState::new(None, 1);
    let response = router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}
