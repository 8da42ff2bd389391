//! Stock reads and back-office stock changes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ItemId;
use inventory::StockRecord;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct StockResponse {
    pub item_id: ItemId,
    pub in_stock: bool,
    pub available_units: u32,
    pub reserved_units: u32,
}

impl From<StockRecord> for StockResponse {
    fn from(record: StockRecord) -> Self {
        Self {
            in_stock: record.available_units > 0,
            item_id: record.item_id,
            available_units: record.available_units,
            reserved_units: record.reserved_units,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PutStockRequest {
    pub units: u32,
}

async fn snapshot(state: &AppState, item_id: &ItemId) -> Result<Json<StockResponse>, ApiError> {
    state
        .ledger
        .snapshot(item_id)
        .await
        .map(|record| Json(record.into()))
        .ok_or_else(|| ApiError::NotFound(format!("Item {item_id} not found")))
}

/// GET /inventory/:item_id
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    snapshot(&state, &ItemId::new(item_id)).await
}

/// PUT /inventory/:item_id: registers an unknown item with `units`, or adds
/// `units` to a known one.
#[tracing::instrument(skip(state, req), fields(units = req.units))]
pub async fn put(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
    Json(req): Json<PutStockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let item_id = ItemId::new(item_id);
    if !state.ledger.register_item(item_id.clone(), req.units).await? {
        state.ledger.restock(&item_id, req.units).await?;
    }
    snapshot(&state, &item_id).await
}
