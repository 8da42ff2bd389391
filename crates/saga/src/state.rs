//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// Where a checkout is in its lifecycle.
///
/// ```text
/// Started ─► StockValidated ─► Reserved ─► OrderPersisted ─► AwaitingPayment
///    │             │              │                              │
///    └─────────────┴──────────────┴─► Aborted        ┌───────────┴───────────┐
///                                                    ▼                       ▼
///                                               Confirming              Releasing
///                                                    │                       │
///                                     Paid ◄─────────┤                       ▼
///                          ReconciliationRequired ◄──┘                 PaymentFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutState {
    #[default]
    Started,
    StockValidated,
    Reserved,
    OrderPersisted,
    AwaitingPayment,

    /// Payment approved; confirming stock line by line.
    Confirming,

    /// Payment declined; releasing stock line by line.
    Releasing,

    Paid,
    PaymentFailed,

    /// Validation or reservation failed and reservations were compensated.
    Aborted,

    /// Paid, but at least one line could not be confirmed.
    ReconciliationRequired,
}

impl CheckoutState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Paid
                | CheckoutState::PaymentFailed
                | CheckoutState::Aborted
                | CheckoutState::ReconciliationRequired
        )
    }

    /// True before the order exists.
    pub fn is_pre_order(&self) -> bool {
        matches!(
            self,
            CheckoutState::Started | CheckoutState::StockValidated | CheckoutState::Reserved
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Started => "STARTED",
            CheckoutState::StockValidated => "STOCK_VALIDATED",
            CheckoutState::Reserved => "RESERVED",
            CheckoutState::OrderPersisted => "ORDER_PERSISTED",
            CheckoutState::AwaitingPayment => "AWAITING_PAYMENT",
            CheckoutState::Confirming => "CONFIRMING",
            CheckoutState::Releasing => "RELEASING",
            CheckoutState::Paid => "PAID",
            CheckoutState::PaymentFailed => "PAYMENT_FAILED",
            CheckoutState::Aborted => "ABORTED",
            CheckoutState::ReconciliationRequired => "RECONCILIATION_REQUIRED",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
