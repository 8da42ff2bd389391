//! Checkout saga events. Each one is appended before the step it records
//! is considered done.

use chrono::{DateTime, Utc};
use common::{AggregateId, ItemId, Money, UserId};
use domain::{DomainEvent, OrderLine};
use serde::{Deserialize, Serialize};

/// How the checkout was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutKind {
    /// From the user's cart; payment arrives by callback.
    #[default]
    FromCart,
    /// One item paid inline through the payment gate.
    SingleItem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    CheckoutStarted(CheckoutStartedData),
    StockValidated(StepData),
    LineReserved(LineReservedData),
    ReservationsCompleted(StepData),
    LineCompensated(LineCompensatedData),

    /// A compensating or releasing ledger call failed; logged, not retried.
    CompensationFailed(LineFailureData),

    CheckoutAborted(ReasonData),
    OrderPersisted(OrderPersistedData),
    AwaitingPayment(AwaitingPaymentData),
    PaymentApproved(PaymentApprovedData),
    LineConfirmed(LineData),

    /// Confirm retries for a line ran out.
    ConfirmAbandoned(LineFailureData),

    CartCleared(StepData),
    CheckoutPaid(PaymentApprovedData),
    ReconciliationRequired(ReasonData),
    PaymentDeclined(PaymentDeclinedData),
    LineReleased(LineData),
    CheckoutPaymentFailed(ReasonData),
}

impl DomainEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted(_) => "CheckoutStarted",
            CheckoutEvent::StockValidated(_) => "CheckoutStockValidated",
            CheckoutEvent::LineReserved(_) => "CheckoutLineReserved",
            CheckoutEvent::ReservationsCompleted(_) => "CheckoutReservationsCompleted",
            CheckoutEvent::LineCompensated(_) => "CheckoutLineCompensated",
            CheckoutEvent::CompensationFailed(_) => "CheckoutCompensationFailed",
            CheckoutEvent::CheckoutAborted(_) => "CheckoutAborted",
            CheckoutEvent::OrderPersisted(_) => "CheckoutOrderPersisted",
            CheckoutEvent::AwaitingPayment(_) => "CheckoutAwaitingPayment",
            CheckoutEvent::PaymentApproved(_) => "CheckoutPaymentApproved",
            CheckoutEvent::LineConfirmed(_) => "CheckoutLineConfirmed",
            CheckoutEvent::ConfirmAbandoned(_) => "CheckoutConfirmAbandoned",
            CheckoutEvent::CartCleared(_) => "CheckoutCartCleared",
            CheckoutEvent::CheckoutPaid(_) => "CheckoutPaid",
            CheckoutEvent::ReconciliationRequired(_) => "CheckoutReconciliationRequired",
            CheckoutEvent::PaymentDeclined(_) => "CheckoutPaymentDeclined",
            CheckoutEvent::LineReleased(_) => "CheckoutLineReleased",
            CheckoutEvent::CheckoutPaymentFailed(_) => "CheckoutPaymentFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    pub checkout_id: AggregateId,

    /// Allocated up front so every ledger call can name the order holder.
    pub order_id: AggregateId,

    pub user_id: UserId,
    pub kind: CheckoutKind,
    pub lines: Vec<OrderLine>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepData {
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineReservedData {
    pub item_id: ItemId,
    /// Units moved over from the cart's holding.
    pub taken_over: u32,
    /// Units freshly reserved to cover the shortfall.
    pub reserved: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineCompensatedData {
    pub item_id: ItemId,
    pub returned_to_cart: u32,
    pub released: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineData {
    pub item_id: ItemId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineFailureData {
    pub item_id: ItemId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonData {
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPersistedData {
    pub total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwaitingPaymentData {
    /// Payment gate reference of the inline flow.
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentApprovedData {
    pub transaction_id: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDeclinedData {
    pub status: String,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

// Convenience constructors
impl CheckoutEvent {
    pub fn checkout_started(
        checkout_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
        kind: CheckoutKind,
        lines: Vec<OrderLine>,
    ) -> Self {
        CheckoutEvent::CheckoutStarted(CheckoutStartedData {
            checkout_id,
            order_id,
            user_id,
            kind,
            lines,
            started_at: Utc::now(),
        })
    }

    pub fn stock_validated() -> Self {
        CheckoutEvent::StockValidated(StepData { at: Utc::now() })
    }

    pub fn line_reserved(item_id: ItemId, taken_over: u32, reserved: u32) -> Self {
        CheckoutEvent::LineReserved(LineReservedData {
            item_id,
            taken_over,
            reserved,
        })
    }

    pub fn reservations_completed() -> Self {
        CheckoutEvent::ReservationsCompleted(StepData { at: Utc::now() })
    }

    pub fn line_compensated(item_id: ItemId, returned_to_cart: u32, released: u32) -> Self {
        CheckoutEvent::LineCompensated(LineCompensatedData {
            item_id,
            returned_to_cart,
            released,
        })
    }

    pub fn compensation_failed(item_id: ItemId, error: impl ToString) -> Self {
        CheckoutEvent::CompensationFailed(LineFailureData {
            item_id,
            error: error.to_string(),
        })
    }

    pub fn checkout_aborted(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutAborted(ReasonData {
            reason: reason.into(),
            at: Utc::now(),
        })
    }

    pub fn order_persisted(total: Money) -> Self {
        CheckoutEvent::OrderPersisted(OrderPersistedData { total })
    }

    pub fn awaiting_payment(payment_reference: Option<String>) -> Self {
        CheckoutEvent::AwaitingPayment(AwaitingPaymentData { payment_reference })
    }

    pub fn payment_approved(transaction_id: Option<String>) -> Self {
        CheckoutEvent::PaymentApproved(PaymentApprovedData {
            transaction_id,
            at: Utc::now(),
        })
    }

    pub fn line_confirmed(item_id: ItemId) -> Self {
        CheckoutEvent::LineConfirmed(LineData { item_id })
    }

    pub fn confirm_abandoned(item_id: ItemId, error: impl ToString) -> Self {
        CheckoutEvent::ConfirmAbandoned(LineFailureData {
            item_id,
            error: error.to_string(),
        })
    }

    pub fn cart_cleared() -> Self {
        CheckoutEvent::CartCleared(StepData { at: Utc::now() })
    }

    pub fn checkout_paid(transaction_id: Option<String>) -> Self {
        CheckoutEvent::CheckoutPaid(PaymentApprovedData {
            transaction_id,
            at: Utc::now(),
        })
    }

    pub fn reconciliation_required(reason: impl Into<String>) -> Self {
        CheckoutEvent::ReconciliationRequired(ReasonData {
            reason: reason.into(),
            at: Utc::now(),
        })
    }

    pub fn payment_declined(status: impl Into<String>, message: Option<String>) -> Self {
        CheckoutEvent::PaymentDeclined(PaymentDeclinedData {
            status: status.into(),
            message,
            at: Utc::now(),
        })
    }

    pub fn line_released(item_id: ItemId) -> Self {
        CheckoutEvent::LineReleased(LineData { item_id })
    }

    pub fn checkout_payment_failed(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutPaymentFailed(ReasonData {
            reason: reason.into(),
            at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_json_is_tagged() {
        let event = CheckoutEvent::line_reserved(ItemId::new("book_1"), 2, 1);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "LineReserved");
        assert_eq!(json["data"]["taken_over"], 2);
        assert_eq!(event.event_type(), "CheckoutLineReserved");

        let back: CheckoutEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(back, CheckoutEvent::LineReserved(d) if d.reserved == 1));
    }
}
