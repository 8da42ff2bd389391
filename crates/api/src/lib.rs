//! HTTP API for the bookstore checkout.
//!
//! REST endpoints for carts, inventory, orders, checkouts and payments, a
//! websocket that pushes stock changes, structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::place_single_item).get(routes::orders::list),
        )
        .route("/orders/from-cart", post(routes::orders::from_cart))
        .route("/orders/{id}", get(routes::orders::get))
        .route(
            "/orders/{id}/payment-result",
            post(routes::orders::payment_result),
        )
        .route("/orders/{id}/status", put(routes::orders::update_status))
        .route("/users/{user_id}/orders", get(routes::orders::list_for_user))
        .route("/checkouts/{id}", get(routes::checkouts::get))
        .route(
            "/carts/{user_id}",
            get(routes::carts::get).delete(routes::carts::clear),
        )
        .route("/carts/{user_id}/items", post(routes::carts::add_item))
        .route(
            "/carts/{user_id}/items/{item_id}",
            put(routes::carts::update_item).delete(routes::carts::remove_item),
        )
        .route(
            "/inventory/{item_id}",
            get(routes::inventory::get).put(routes::inventory::put),
        )
        .route("/payments", post(routes::payments::create))
        .route("/payments/{reference}", get(routes::payments::get))
        .route(
            "/payments/{reference}/process",
            post(routes::payments::process),
        )
        .route("/ws/stock", get(routes::stock::subscribe))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
