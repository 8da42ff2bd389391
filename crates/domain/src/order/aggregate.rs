//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, UserId};
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{OrderError, OrderEvent, OrderLine, OrderStatus, events::OrderCreatedData};

/// Order aggregate root.
///
/// The line snapshot and total are fixed at creation. Only the status, the
/// payment transaction id and the reconciliation flag change afterwards.
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    checkout_id: Option<AggregateId>,
    user_id: Option<UserId>,
    lines: Vec<OrderLine>,
    total: Money,
    status: OrderStatus,
    payment_transaction_id: Option<String>,
    needs_reconciliation: bool,
    discarded: bool,
    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderCreated(data) => self.apply_order_created(data),
            OrderEvent::OrderPaid(data) => {
                self.status = OrderStatus::Paid;
                self.payment_transaction_id = data.transaction_id;
            }
            OrderEvent::PaymentFailed(_) => {
                self.status = OrderStatus::PaymentFailed;
            }
            OrderEvent::ReconciliationFlagged(_) => {
                self.needs_reconciliation = true;
            }
            OrderEvent::OrderShipped(_) => {
                self.status = OrderStatus::Shipped;
            }
            OrderEvent::OrderDelivered(_) => {
                self.status = OrderStatus::Delivered;
            }
            OrderEvent::OrderDiscarded(_) => {
                self.discarded = true;
            }
        }
    }
}

impl Order {
    fn apply_order_created(&mut self, data: OrderCreatedData) {
        self.id = Some(data.order_id);
        self.checkout_id = Some(data.checkout_id);
        self.user_id = Some(data.user_id);
        self.lines = data.lines;
        self.total = data.total;
        self.status = OrderStatus::Created;
        self.created_at = Some(data.created_at);
    }

    fn ensure_live(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotFound);
        }
        if self.discarded {
            return Err(OrderError::Discarded);
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_status: self.status,
            action,
        }
    }
}

// Query methods
impl Order {
    pub fn checkout_id(&self) -> Option<AggregateId> {
        self.checkout_id
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_transaction_id(&self) -> Option<&str> {
        self.payment_transaction_id.as_deref()
    }

    pub fn needs_reconciliation(&self) -> bool {
        self.needs_reconciliation
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn items_count(&self) -> usize {
        self.lines.len()
    }
}

// Command methods (return events)
impl Order {
    pub fn create(
        &self,
        order_id: AggregateId,
        checkout_id: AggregateId,
        user_id: UserId,
        lines: Vec<OrderLine>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }
        if lines.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(line) = lines.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                item_id: line.item_id.clone(),
            });
        }

        Ok(vec![OrderEvent::order_created(
            order_id,
            checkout_id,
            user_id,
            lines,
        )])
    }

    /// Records an approved payment. Repeating it on a paid order is a no-op.
    pub fn mark_paid(&self, transaction_id: Option<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_live()?;
        match self.status {
            OrderStatus::Created => Ok(vec![OrderEvent::order_paid(transaction_id)]),
            OrderStatus::Paid => Ok(vec![]),
            _ => Err(self.invalid("mark paid")),
        }
    }

    /// Records a declined payment. Repeating it is a no-op.
    pub fn mark_payment_failed(
        &self,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_live()?;
        match self.status {
            OrderStatus::Created => Ok(vec![OrderEvent::payment_failed(reason)]),
            OrderStatus::PaymentFailed => Ok(vec![]),
            _ => Err(self.invalid("mark payment failed")),
        }
    }

    pub fn flag_for_reconciliation(
        &self,
        reason: impl Into<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_live()?;
        if self.needs_reconciliation {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::reconciliation_flagged(reason)])
    }

    /// Manual fulfilment transition. Only SHIPPED and DELIVERED can be set
    /// by hand; payment outcomes belong to the checkout.
    pub fn update_status(&self, target: OrderStatus) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_live()?;
        match target {
            OrderStatus::Shipped if self.status.can_ship() => Ok(vec![OrderEvent::order_shipped()]),
            OrderStatus::Delivered if self.status.can_deliver() => {
                Ok(vec![OrderEvent::order_delivered()])
            }
            _ if target == self.status => Ok(vec![]),
            _ => Err(self.invalid("update status")),
        }
    }

    /// Drops an unpaid order.
    pub fn discard(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotFound);
        }
        if self.discarded {
            return Ok(vec![]);
        }
        if !matches!(self.status, OrderStatus::Created | OrderStatus::PaymentFailed) {
            return Err(self.invalid("discard"));
        }
        Ok(vec![OrderEvent::order_discarded(reason)])
    }
}
