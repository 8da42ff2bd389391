//! Checkout saga inspection.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use saga::CheckoutSaga;

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /checkouts/:id: the saga record with its per-line progress.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CheckoutSaga>, ApiError> {
    let checkout_id = parse_aggregate_id(&id)?;
    let saga = state
        .coordinator
        .get_checkout(checkout_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Checkout {id} not found")))?;
    Ok(Json(saga))
}
