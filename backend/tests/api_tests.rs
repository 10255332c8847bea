//! HTTP API tests
//!
//! Drives the full router with the in-memory store:
//! - Request/response shapes
//! - Error body and status mapping
//! - Acting employee header

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use ledger_server::{create_app, AppState, Config, MemoryStore};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    create_app(AppState::new(Arc::new(MemoryStore::new()), Config::default()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, method, uri, body, None).await
}

async fn send_as(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    employee: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(employee) = employee {
        builder = builder.header("X-Employee-Id", employee);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Create a batch and return `(batch_id, stock_record_id)`
async fn create_batch(app: &Router, code: &str) -> (String, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/batches",
        Some(json!({
            "batch_code": code,
            "product_id": uuid::Uuid::new_v4(),
            "quantity": 100,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["batch"]["id"].as_str().unwrap().to_string(),
        body["stock_record"]["id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "connected");
}

#[tokio::test]
async fn test_record_movement_round_trip() {
    let app = app();
    let (batch_id, record_id) = create_batch(&app, "B-401").await;

    let (status, body) = send_as(
        &app,
        Method::POST,
        "/api/v1/movements",
        Some(json!({
            "batch_id": batch_id,
            "inventoryDetailId": record_id,
            "movement_type": "in",
            "quantity": 100,
        })),
        Some("6f1c2a54-0d1e-4a57-9a8e-2f4b1f0c9e11"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movement"]["movement_number"], 1);
    assert_eq!(
        body["movement"]["performed_by"],
        "6f1c2a54-0d1e-4a57-9a8e-2f4b1f0c9e11"
    );
    assert_eq!(body["stock_record"]["quantity_on_hand"], 100);
    assert_eq!(body["stock_record"]["quantity_available"], 100);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/movements?inventory_detail={}", record_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_items"], 1);
    assert_eq!(body["data"][0]["movement_type"], "in");
}

#[tokio::test]
async fn test_insufficient_stock_error_body() {
    let app = app();
    let (batch_id, record_id) = create_batch(&app, "B-402").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/movements",
        Some(json!({
            "batch_id": batch_id,
            "inventory_detail_id": record_id,
            "movement_type": "out",
            "quantity": 5,
            "side": "on_hand",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["error"]["context"]["current"], 0);
    assert_eq!(body["error"]["context"]["requested"], 5);
}

#[tokio::test]
async fn test_delete_movement_appends_reversal() {
    let app = app();
    let (batch_id, record_id) = create_batch(&app, "B-403").await;
    let (_, applied) = send(
        &app,
        Method::POST,
        "/api/v1/movements",
        Some(json!({
            "batch_id": batch_id,
            "inventory_detail_id": record_id,
            "movement_type": "in",
            "quantity": 12,
        })),
    )
    .await;
    let movement_id = applied["movement"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/movements/{}", movement_id);
    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movement"]["reversal_of"], movement_id.as_str());
    assert_eq!(body["stock_record"]["quantity_on_hand"], 0);

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_REVERSED");
}

#[tokio::test]
async fn test_location_assignment_conflict() {
    let app = app();
    let (status, location) = send(
        &app,
        Method::POST,
        "/api/v1/locations",
        Some(json!({ "name": "A-07", "location_code": "WH-A-07", "max_capacity": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let location_id = location["id"].as_str().unwrap().to_string();

    let (_, first) = create_batch(&app, "B-404").await;
    let (_, second) = create_batch(&app, "B-405").await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/stock-records/{}/location", first),
        Some(json!({ "location_id": location_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/stock-records/{}/location", second),
        Some(json!({ "location_id": location_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "LOCATION_OCCUPIED");
    assert_eq!(body["error"]["context"]["location_name"], "A-07");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/locations/{}/occupancy", location_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["occupant"], first.as_str());
}

#[tokio::test]
async fn test_bulk_transfer_endpoint() {
    let app = app();
    let (batch_id, record_id) = create_batch(&app, "B-406").await;
    send(
        &app,
        Method::POST,
        "/api/v1/movements",
        Some(json!({
            "batch_id": batch_id,
            "inventory_detail_id": record_id,
            "movement_type": "in",
            "quantity": 10,
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/transfers/bulk",
        Some(json!({
            "items": [{ "detailInventoryId": record_id, "quantity": 4 }],
            "direction": "toShelf",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 0);
}

#[tokio::test]
async fn test_invalid_employee_header_is_rejected() {
    let app = app();
    let (status, body) = send_as(
        &app,
        Method::GET,
        "/api/v1/batches",
        None,
        Some("not-a-uuid"),
    )
    .await;
    // Read-only routes do not extract the acting employee
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send_as(
        &app,
        Method::POST,
        "/api/v1/batches",
        Some(json!({ "batch_code": "B-407", "product_id": uuid::Uuid::new_v4(), "quantity": 1 })),
        Some("not-a-uuid"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "X-Employee-Id");
}

#[tokio::test]
async fn test_unknown_stock_record_is_not_found() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/stock-records/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
