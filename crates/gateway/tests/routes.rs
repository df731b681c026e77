//! Router-level tests that run without a database
//!
//! The pool wraps a disconnected connection, so these cover everything that
//! is decided before the first query: routing, tenant resolution for hosts
//! that cannot match, authentication, body validation and error shapes.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use labtrack_common::{config::AppConfig, db::DbPool};
use labtrack_gateway::{create_router, AppState};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    create_router(AppState {
        config: Arc::new(AppConfig::default()),
        db: DbPool::from_connection(DatabaseConnection::default()),
    })
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let (status, body) = send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn ready_is_unavailable_without_database() {
    let (status, body) = send(get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["checks"]["database"]["status"], "down");
}

#[tokio::test]
async fn sample_routes_need_a_tenant_host() {
    let (status, body) = send(get("/api/samples/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "TENANT_NOT_FOUND");

    let (status, _) = send(get("/api/samples/statistics/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(get("/api/sample-results/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn current_schema_without_tenant_is_public() {
    let (status, body) = send(get("/api/centers/get_current_schema/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "schema_name": "public", "tenant": null }));
}

#[tokio::test]
async fn profile_requires_bearer_token() {
    let (status, body) = send(get("/api/users/profile/")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .uri("/api/users/center_users/")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn center_creation_validates_fields() {
    let (status, body) = send(json_request(Method::POST, "/api/centers/", json!({ "name": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["name"].is_array());
}

#[tokio::test]
async fn center_schema_is_immutable() {
    let uri = format!("/api/centers/{}/", uuid::Uuid::new_v4());
    let (status, body) = send(json_request(Method::PATCH, &uri, json!({ "schema_name": "other" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["schema_name"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users/login/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn registration_rejects_bad_email() {
    let (status, body) = send(json_request(
        Method::POST,
        "/api/users/",
        json!({ "email": "not-an-email", "username": "tech", "password": "s3cure-pass" }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["email"].is_array());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (status, _) = send(get("/api/inventory/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
