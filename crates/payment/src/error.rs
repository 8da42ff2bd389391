use thiserror::Error;

use crate::record::PaymentStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Payment not found: {0}")]
    NotFound(String),

    /// The payment already left PENDING; carries the recorded status.
    #[error("Payment {reference} already processed with status {status}")]
    AlreadyProcessed {
        reference: String,
        status: PaymentStatus,
    },

    /// Another request is authorizing this payment right now. Retryable.
    #[error("Payment {0} is being processed")]
    InProgress(String),

    #[error("Invalid card: {0}")]
    InvalidCard(String),

    #[error("Invalid amount: {0} cents")]
    InvalidAmount(i64),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
