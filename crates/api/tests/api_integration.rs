//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::state::Store;
use api::{AppState, Config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ItemId;
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup() -> axum::Router {
    let config = Config::default();
    let state = AppState::new(Arc::new(InMemoryEventStore::new()), &config);
    state
        .restore_inventory(&[
            (ItemId::new("book_1"), 5),
            (ItemId::new("book_2"), 2),
        ])
        .await
        .unwrap();
    api::create_app(state, get_metrics_handle())
}

/// A server over `store`, as it comes up after a restart.
async fn boot(store: Store) -> axum::Router {
    let state = AppState::new(store, &Config::default());
    state
        .restore_inventory(&[(ItemId::new("book_1"), 5)])
        .await
        .unwrap();
    state.coordinator.resume_incomplete().await.unwrap();
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn add_to_cart(app: &axum::Router, user: &str, item: &str, quantity: u32) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/carts/{user}/items"),
        Some(json!({
            "item_id": item,
            "title": format!("Title of {item}"),
            "unit_price_cents": 1000,
            "quantity": quantity
        })),
    )
    .await
}

fn card(holder: &str) -> Value {
    json!({
        "card_number": "4111 1111 1111 1111",
        "card_holder": holder,
        "expiry_date": "12/30",
        "cvv": "123"
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;
    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_inventory_register_restock_and_read() {
    let app = setup().await;

    let (status, json) = send(&app, "PUT", "/inventory/book_9", Some(json!({"units": 4}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available_units"], 4);
    assert_eq!(json["in_stock"], true);

    let (_, json) = send(&app, "PUT", "/inventory/book_9", Some(json!({"units": 3}))).await;
    assert_eq!(json["available_units"], 7);

    let (status, json) = send(&app, "GET", "/inventory/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["message"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_cart_reserves_stock() {
    let app = setup().await;

    let (status, cart) = add_to_cart(&app, "alice", "book_1", 2).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(cart["total"], 2000);
    assert_eq!(cart["items"][0]["quantity"], 2);

    let (_, stock) = send(&app, "GET", "/inventory/book_1", None).await;
    assert_eq!(stock["available_units"], 3);
    assert_eq!(stock["reserved_units"], 2);

    let (status, json) = add_to_cart(&app, "alice", "book_2", 3).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("book_2"));

    let (status, cart) = send(
        &app,
        "PUT",
        "/carts/alice/items/book_1",
        Some(json!({"quantity": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total"], 1000);

    let (status, json) = send(&app, "DELETE", "/carts/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, stock) = send(&app, "GET", "/inventory/book_1", None).await;
    assert_eq!(stock["available_units"], 5);

    let (status, _) = send(&app, "DELETE", "/carts/alice/items/book_1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_from_cart_and_approve() {
    let app = setup().await;
    add_to_cart(&app, "alice", "book_1", 2).await;

    let (status, receipt) = send(
        &app,
        "POST",
        "/orders/from-cart",
        Some(json!({"user_id": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["total"], 2000);
    assert_eq!(receipt["items_count"], 1);
    let order_id = receipt["order_id"].as_str().unwrap().to_string();
    let checkout_id = receipt["checkout_id"].as_str().unwrap().to_string();

    let (_, order) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(order["status"], "CREATED");

    let (_, saga) = send(&app, "GET", &format!("/checkouts/{checkout_id}"), None).await;
    assert_eq!(saga["state"], "AWAITING_PAYMENT");

    let (status, ack) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/payment-result"),
        Some(json!({"status": "APPROVED", "transaction_id": "tx-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], true);

    let (_, order) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(order["status"], "PAID");
    assert_eq!(order["payment_transaction_id"], "tx-1");

    let (_, stock) = send(&app, "GET", "/inventory/book_1", None).await;
    assert_eq!(stock["available_units"], 3);
    assert_eq!(stock["reserved_units"], 0);

    let (_, cart) = send(&app, "GET", "/carts/alice", None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    let (_, orders) = send(&app, "GET", "/users/alice/orders", None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let (status, order) = send(
        &app,
        "PUT",
        &format!("/orders/{order_id}/status"),
        Some(json!({"status": "SHIPPED"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "SHIPPED");
}

#[tokio::test]
async fn test_declined_payment_releases_stock() {
    let app = setup().await;
    add_to_cart(&app, "bob", "book_1", 2).await;
    let (_, receipt) = send(&app, "POST", "/orders/from-cart", Some(json!({"user_id": "bob"}))).await;
    let order_id = receipt["order_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/payment-result"),
        Some(json!({"status": "DECLINED", "message": "insufficient funds"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(order["status"], "PAYMENT_FAILED");
    let (_, stock) = send(&app, "GET", "/inventory/book_1", None).await;
    assert_eq!(stock["available_units"], 5);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orders/{order_id}/status"),
        Some(json!({"status": "SHIPPED"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_checkout_errors() {
    let app = setup().await;

    let (status, json) = send(&app, "POST", "/orders/from-cart", Some(json!({"user_id": "nobody"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Cart is empty");

    let (status, _) = send(
        &app,
        "POST",
        "/orders/00000000-0000-0000-0000-000000000000/payment-result",
        Some(json!({"status": "APPROVED"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/orders/00000000-0000-0000-0000-000000000000/payment-result",
        Some(json!({"status": "APPROVED", "amount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_single_item_orders() {
    let app = setup().await;

    let (status, receipt) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "user_id": "carol",
            "item_id": "book_1",
            "title": "Dune",
            "quantity": 1,
            "unit_price_cents": 1500,
            "card": card("Carol")
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["status"], "PAID");
    assert_eq!(receipt["total"], 1500);

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "user_id": "carol",
            "item_id": "book_1",
            "title": "Dune",
            "quantity": 1,
            "unit_price_cents": 1500,
            "card": card("REJECTED")
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("DECLINED"));

    let (_, stock) = send(&app, "GET", "/inventory/book_1", None).await;
    assert_eq!(stock["available_units"], 4);

    let (_, orders) = send(&app, "GET", "/orders", None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_gate_is_idempotent() {
    let app = setup().await;
    let order_id = "8c0e3a52-7f1d-4c55-9d0c-0b5d8f1c2a11";

    let (status, created) = send(
        &app,
        "POST",
        "/payments",
        Some(json!({"order_id": order_id, "amount_cents": 2500, "description": "two books"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let reference = created["reference"].as_str().unwrap().to_string();
    assert!(reference.starts_with("REF-"));

    let (_, record) = send(&app, "GET", &format!("/payments/{reference}"), None).await;
    assert_eq!(record["status"], "PENDING");

    let uri = format!("/payments/{reference}/process");
    let (status, outcome) = send(&app, "POST", &uri, Some(card("Dana"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "APPROVED");

    // A duplicate submission gets the recorded outcome, not a second charge.
    let (status, again) = send(&app, "POST", &uri, Some(card("REJECTED"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["status"], "APPROVED");
    assert_eq!(again["transaction_id"], outcome["transaction_id"]);

    let (status, _) = send(
        &app,
        "POST",
        "/payments",
        Some(json!({"order_id": order_id, "amount_cents": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/payments/REF-unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_restart_keeps_stock_and_pending_checkouts() {
    let store: Store = Arc::new(InMemoryEventStore::new());

    let app = boot(store.clone()).await;
    add_to_cart(&app, "erin", "book_1", 2).await;
    add_to_cart(&app, "frank", "book_1", 1).await;
    let (status, receipt) = send(&app, "POST", "/orders/from-cart", Some(json!({"user_id": "erin"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = receipt["order_id"].as_str().unwrap().to_string();

    // Same store, fresh process: seeding must not reset what was recorded.
    let app = boot(store).await;
    let (_, stock) = send(&app, "GET", "/inventory/book_1", None).await;
    assert_eq!(stock["available_units"], 2);
    assert_eq!(stock["reserved_units"], 3);

    let (status, ack) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/payment-result"),
        Some(json!({"status": "APPROVED", "transaction_id": "tx-9"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], true);

    let (_, order) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(order["status"], "PAID");
    assert_eq!(order["needs_reconciliation"], false);

    let (_, stock) = send(&app, "GET", "/inventory/book_1", None).await;
    assert_eq!(stock["available_units"], 2);
    assert_eq!(stock["reserved_units"], 1);
}

#[tokio::test]
async fn test_repeated_checkout_returns_the_pending_order() {
    let app = setup().await;
    add_to_cart(&app, "gina", "book_1", 2).await;

    let (status, first) = send(&app, "POST", "/orders/from-cart", Some(json!({"user_id": "gina"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = send(&app, "POST", "/orders/from-cart", Some(json!({"user_id": "gina"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["order_id"], first["order_id"]);

    let (_, stock) = send(&app, "GET", "/inventory/book_1", None).await;
    assert_eq!(stock["available_units"], 3);

    add_to_cart(&app, "gina", "book_2", 1).await;
    let (status, _) = send(&app, "POST", "/orders/from-cart", Some(json!({"user_id": "gina"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
