//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, DomainError, OrderError};
use event_store::EventStoreError;
use inventory::LedgerError;
use payment::PaymentError;
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
///
/// Every error body is `{"message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Saga(#[from] SagaError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Stock(#[from] LedgerError),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => (domain_status(&err), err.to_string()),
            ApiError::Saga(err) => (saga_status(&err), err.to_string()),
            ApiError::Payment(err) => (payment_status(&err), err.to_string()),
            ApiError::Stock(err) => (ledger_status(&err), err.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::UnknownItem(_) => StatusCode::NOT_FOUND,
        LedgerError::InvalidQuantity | LedgerError::InsufficientStock { .. } => {
            StatusCode::BAD_REQUEST
        }
        LedgerError::ExceedsReservation { .. } => StatusCode::CONFLICT,
        LedgerError::Journal(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn payment_status(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::AlreadyProcessed { .. } | PaymentError::InProgress(_) => StatusCode::CONFLICT,
        PaymentError::InvalidCard(_) | PaymentError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
    }
}

fn store_status(err: &EventStoreError) -> StatusCode {
    match err {
        EventStoreError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        EventStoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Cart(CartError::ItemNotInCart(_)) => StatusCode::NOT_FOUND,
        DomainError::Cart(_) => StatusCode::BAD_REQUEST,
        DomainError::Order(OrderError::NotFound | OrderError::Discarded) => StatusCode::NOT_FOUND,
        DomainError::Order(
            OrderError::InvalidStateTransition { .. } | OrderError::AlreadyCreated,
        ) => StatusCode::CONFLICT,
        DomainError::Order(_) => StatusCode::BAD_REQUEST,
        DomainError::Stock(e) => ledger_status(e),
        DomainError::AggregateNotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::EventStore(e) => store_status(e),
        DomainError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        SagaError::EmptyCart
        | SagaError::InsufficientStock { .. }
        | SagaError::ReservationFailed { .. }
        | SagaError::PaymentDeclined { .. } => StatusCode::BAD_REQUEST,
        SagaError::InvalidState { .. } | SagaError::CheckoutPending { .. } => StatusCode::CONFLICT,
        SagaError::CheckoutNotFound(_) | SagaError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        SagaError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SagaError::Stock(e) => ledger_status(e),
        SagaError::Payment(e) => payment_status(e),
        SagaError::Domain(e) => domain_status(e),
        SagaError::EventStore(e) => store_status(e),
        SagaError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
