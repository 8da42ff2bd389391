//! Payment gate endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::Money;
use payment::{CardDetails, PaymentError, PaymentOutcome, PaymentRecord};
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub amount_cents: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize)]
pub struct CreatePaymentResponse {
    pub reference: String,
}

/// POST /payments: a fresh PENDING payment for an order.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let order_id = parse_aggregate_id(&req.order_id)?;
    let record = state.payments.create_payment(
        order_id,
        Money::from_cents(req.amount_cents),
        req.description,
    )?;
    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            reference: record.reference,
        }),
    ))
}

/// POST /payments/:reference/process
///
/// A payment that was already processed answers with its recorded outcome.
#[tracing::instrument(skip(state, card))]
pub async fn process(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
    Json(card): Json<CardDetails>,
) -> Result<Json<PaymentOutcome>, ApiError> {
    match state.payments.process_payment(&reference, &card).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(PaymentError::AlreadyProcessed { .. }) => {
            let record = state.payments.get_payment(&reference)?;
            tracing::debug!(status = %record.status, "Payment already processed");
            Ok(Json(PaymentOutcome::from(&record)))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /payments/:reference
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentRecord>, ApiError> {
    Ok(Json(state.payments.get_payment(&reference)?))
}
