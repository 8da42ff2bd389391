//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::OrderLine;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderCreated(OrderCreatedData),

    /// Payment approved and stock confirmed.
    OrderPaid(OrderPaidData),

    PaymentFailed(PaymentFailedData),

    /// Stock confirmation kept failing after approval; an operator must
    /// settle the ledger by hand.
    ReconciliationFlagged(ReconciliationFlaggedData),

    OrderShipped(OrderShippedData),

    OrderDelivered(OrderDeliveredData),

    /// The single-item flow dropped the order after its payment failed.
    OrderDiscarded(OrderDiscardedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::OrderPaid(_) => "OrderPaid",
            OrderEvent::PaymentFailed(_) => "OrderPaymentFailed",
            OrderEvent::ReconciliationFlagged(_) => "OrderReconciliationFlagged",
            OrderEvent::OrderShipped(_) => "OrderShipped",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
            OrderEvent::OrderDiscarded(_) => "OrderDiscarded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,

    /// The checkout saga that created the order.
    pub checkout_id: AggregateId,

    pub user_id: UserId,
    pub lines: Vec<OrderLine>,

    /// Computed once at creation.
    pub total: Money,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidData {
    pub transaction_id: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub reason: Option<String>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationFlaggedData {
    pub reason: String,
    pub flagged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShippedData {
    pub shipped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDeliveredData {
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDiscardedData {
    pub reason: String,
    pub discarded_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn order_created(
        order_id: AggregateId,
        checkout_id: AggregateId,
        user_id: UserId,
        lines: Vec<OrderLine>,
    ) -> Self {
        let total = lines.iter().map(OrderLine::total_price).sum();
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            checkout_id,
            user_id,
            lines,
            total,
            created_at: Utc::now(),
        })
    }

    pub fn order_paid(transaction_id: Option<String>) -> Self {
        OrderEvent::OrderPaid(OrderPaidData {
            transaction_id,
            paid_at: Utc::now(),
        })
    }

    pub fn payment_failed(reason: Option<String>) -> Self {
        OrderEvent::PaymentFailed(PaymentFailedData {
            reason,
            failed_at: Utc::now(),
        })
    }

    pub fn reconciliation_flagged(reason: impl Into<String>) -> Self {
        OrderEvent::ReconciliationFlagged(ReconciliationFlaggedData {
            reason: reason.into(),
            flagged_at: Utc::now(),
        })
    }

    pub fn order_shipped() -> Self {
        OrderEvent::OrderShipped(OrderShippedData {
            shipped_at: Utc::now(),
        })
    }

    pub fn order_delivered() -> Self {
        OrderEvent::OrderDelivered(OrderDeliveredData {
            delivered_at: Utc::now(),
        })
    }

    pub fn order_discarded(reason: impl Into<String>) -> Self {
        OrderEvent::OrderDiscarded(OrderDiscardedData {
            reason: reason.into(),
            discarded_at: Utc::now(),
        })
    }
}
