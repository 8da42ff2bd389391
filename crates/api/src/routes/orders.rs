//! Order endpoints: cart checkout, single-item orders, payment outcomes and
//! order queries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ItemId, Money, UserId};
use domain::{Aggregate, Order, OrderStatus};
use payment::CardDetails;
use saga::{CheckoutReceipt, PaymentResult, PaymentResultAck, PlaceSingleItemOrder, SingleItemReceipt};
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FromCartRequest {
    pub user_id: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SingleItemRequest {
    pub user_id: String,
    pub item_id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub card: CardDetails,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub checkout_id: Option<String>,
    pub user_id: Option<String>,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub payment_transaction_id: Option<String>,
    pub needs_reconciliation: bool,
    pub created_at: Option<String>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub item_id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            checkout_id: order.checkout_id().map(|id| id.to_string()),
            user_id: order.user_id().map(ToString::to_string),
            status: order.status(),
            items: order
                .lines()
                .iter()
                .map(|line| OrderItemResponse {
                    item_id: line.item_id.to_string(),
                    title: line.title.clone(),
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                })
                .collect(),
            total_cents: order.total().cents(),
            payment_transaction_id: order.payment_transaction_id().map(String::from),
            needs_reconciliation: order.needs_reconciliation(),
            created_at: order.created_at().map(|t| t.to_rfc3339()),
        }
    }
}

// -- Handlers --

/// POST /orders/from-cart: turn the user's cart into an order awaiting
/// payment.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn from_cart(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FromCartRequest>,
) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    let user_id = UserId::new(req.user_id);
    let receipt = state.coordinator.checkout_from_cart(&user_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /orders: one item, paid inline with the submitted card.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id, item_id = %req.item_id))]
pub async fn place_single_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SingleItemRequest>,
) -> Result<(StatusCode, Json<SingleItemReceipt>), ApiError> {
    let receipt = state
        .coordinator
        .place_single_item_order(PlaceSingleItemOrder {
            user_id: UserId::new(req.user_id),
            item_id: ItemId::new(req.item_id),
            title: req.title,
            quantity: req.quantity,
            unit_price: Money::from_cents(req.unit_price_cents),
            card: req.card,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /orders/:id/payment-result: settle the order's checkout.
#[tracing::instrument(skip(state, result))]
pub async fn payment_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(result): Json<PaymentResult>,
) -> Result<Json<PaymentResultAck>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let ack = state
        .coordinator
        .handle_payment_result(order_id, result)
        .await?;
    Ok(Json(ack))
}

/// GET /orders
pub async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.coordinator.list_orders().await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/:id
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state
        .coordinator
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /users/:user_id/orders
pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .coordinator
        .list_orders_for_user(&UserId::new(user_id))
        .await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// PUT /orders/:id/status: SHIPPED or DELIVERED.
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state
        .coordinator
        .update_order_status(order_id, req.status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
