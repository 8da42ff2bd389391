//! Checkout error types.

use common::{AggregateId, ItemId};
use domain::DomainError;
use event_store::EventStoreError;
use inventory::LedgerError;
use payment::PaymentError;
use thiserror::Error;

use crate::state::CheckoutState;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Cart is empty")]
    EmptyCart,

    /// Stock validation found a line that cannot be satisfied.
    #[error("Insufficient stock for {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: ItemId,
        available: u32,
        requested: u32,
    },

    /// A reservation failed partway; earlier lines were compensated.
    #[error("Reservation failed for {item_id}: {reason}")]
    ReservationFailed { item_id: ItemId, reason: String },

    #[error("Payment declined ({status}): {message}")]
    PaymentDeclined { status: String, message: String },

    /// The checkout is not in a state that accepts the operation.
    #[error("Invalid checkout state {state}: {reason}")]
    InvalidState {
        state: CheckoutState,
        reason: String,
    },

    /// The user's cart already has a checkout waiting for payment, and the
    /// cart has changed since.
    #[error("Checkout {checkout_id} is still awaiting payment for order {order_id}")]
    CheckoutPending {
        checkout_id: AggregateId,
        order_id: AggregateId,
    },

    #[error("Checkout not found: {0}")]
    CheckoutNotFound(AggregateId),

    #[error("Order not found: {0}")]
    OrderNotFound(AggregateId),

    /// A downstream call timed out or could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Stock error: {0}")]
    Stock(#[from] LedgerError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SagaError>;
