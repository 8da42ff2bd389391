//! Cart endpoints. Every change reserves or releases stock before the cart
//! is written.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ItemId, Money, UserId};
use domain::{AddCartItem, CartSummary, UpdateCartItemQuantity};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddItemRequest {
    pub item_id: String,
    pub title: String,
    pub unit_price_cents: i64,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct ClearCartResponse {
    pub success: bool,
    pub message: String,
}

async fn summary(state: &AppState, user_id: &UserId) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.carts.get_cart_items(user_id).await?))
}

/// GET /carts/:user_id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartSummary>, ApiError> {
    summary(&state, &UserId::new(user_id)).await
}

/// POST /carts/:user_id/items
#[tracing::instrument(skip(state, req), fields(item_id = %req.item_id, quantity = req.quantity))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartSummary>), ApiError> {
    let user_id = UserId::new(user_id);
    let cmd = AddCartItem::new(
        user_id.clone(),
        req.item_id,
        req.title,
        Money::from_cents(req.unit_price_cents),
    )
    .with_quantity(req.quantity);
    state.carts.add_item(cmd).await?;
    Ok((StatusCode::CREATED, summary(&state, &user_id).await?))
}

/// PUT /carts/:user_id/items/:item_id
#[tracing::instrument(skip(state, req), fields(quantity = req.quantity))]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((user_id, item_id)): Path<(String, String)>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartSummary>, ApiError> {
    let user_id = UserId::new(user_id);
    state
        .carts
        .update_quantity(UpdateCartItemQuantity::new(
            user_id.clone(),
            item_id,
            req.quantity,
        ))
        .await?;
    summary(&state, &user_id).await
}

/// DELETE /carts/:user_id/items/:item_id
#[tracing::instrument(skip(state))]
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((user_id, item_id)): Path<(String, String)>,
) -> Result<Json<CartSummary>, ApiError> {
    let user_id = UserId::new(user_id);
    state
        .carts
        .remove_item(&user_id, &ItemId::new(item_id))
        .await?;
    summary(&state, &user_id).await
}

/// DELETE /carts/:user_id: release every reservation and empty the cart.
#[tracing::instrument(skip(state))]
pub async fn clear(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearCartResponse>, ApiError> {
    state.carts.clear_cart(&UserId::new(user_id)).await?;
    Ok(Json(ClearCartResponse {
        success: true,
        message: "Cart cleared".to_string(),
    }))
}
