//! Checkout saga aggregate.

use chrono::{DateTime, Utc};
use common::{AggregateId, ItemId, Money, UserId};
use domain::{Aggregate, OrderLine};
use event_store::Version;
use serde::Serialize;

use crate::error::SagaError;
use crate::events::{CheckoutEvent, CheckoutKind};
use crate::state::CheckoutState;

/// How one line's units came to be held by the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservedLine {
    pub item_id: ItemId,
    pub taken_over: u32,
    pub reserved: u32,
}

/// One checkout, rebuilt from its events.
///
/// Besides the state it remembers which lines were reserved, confirmed,
/// released or compensated, so an interrupted checkout can pick up exactly
/// where it stopped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckoutSaga {
    id: Option<AggregateId>,
    #[serde(skip)]
    version: Version,
    order_id: Option<AggregateId>,
    user_id: Option<UserId>,
    kind: CheckoutKind,
    lines: Vec<OrderLine>,
    state: CheckoutState,
    reserved: Vec<ReservedLine>,
    compensated: Vec<ItemId>,
    confirmed: Vec<ItemId>,
    abandoned: Vec<ItemId>,
    released: Vec<ItemId>,
    cart_cleared: bool,
    total: Option<Money>,
    payment_reference: Option<String>,
    transaction_id: Option<String>,
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl Aggregate for CheckoutSaga {
    type Event = CheckoutEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        "Checkout"
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
            CheckoutEvent::CheckoutStarted(data) => {
                self.id = Some(data.checkout_id);
                self.order_id = Some(data.order_id);
                self.user_id = Some(data.user_id);
                self.kind = data.kind;
                self.lines = data.lines;
                self.state = CheckoutState::Started;
                self.started_at = Some(data.started_at);
            }
            CheckoutEvent::StockValidated(_) => self.state = CheckoutState::StockValidated,
            CheckoutEvent::LineReserved(data) => self.reserved.push(ReservedLine {
                item_id: data.item_id,
                taken_over: data.taken_over,
                reserved: data.reserved,
            }),
            CheckoutEvent::ReservationsCompleted(_) => self.state = CheckoutState::Reserved,
            CheckoutEvent::LineCompensated(data) => self.compensated.push(data.item_id),
            CheckoutEvent::CompensationFailed(_) => {}
            CheckoutEvent::CheckoutAborted(data) => {
                self.state = CheckoutState::Aborted;
                self.failure_reason = Some(data.reason);
            }
            CheckoutEvent::OrderPersisted(data) => {
                self.state = CheckoutState::OrderPersisted;
                self.total = Some(data.total);
            }
            CheckoutEvent::AwaitingPayment(data) => {
                self.state = CheckoutState::AwaitingPayment;
                if data.payment_reference.is_some() {
                    self.payment_reference = data.payment_reference;
                }
            }
            CheckoutEvent::PaymentApproved(data) => {
                self.state = CheckoutState::Confirming;
                self.transaction_id = data.transaction_id;
            }
            CheckoutEvent::LineConfirmed(data) => self.confirmed.push(data.item_id),
            CheckoutEvent::ConfirmAbandoned(data) => self.abandoned.push(data.item_id),
            CheckoutEvent::CartCleared(_) => self.cart_cleared = true,
            CheckoutEvent::CheckoutPaid(_) => self.state = CheckoutState::Paid,
            CheckoutEvent::ReconciliationRequired(data) => {
                self.state = CheckoutState::ReconciliationRequired;
                self.failure_reason = Some(data.reason);
            }
            CheckoutEvent::PaymentDeclined(data) => {
                self.state = CheckoutState::Releasing;
                self.failure_reason = Some(match data.message {
                    Some(message) => format!("{}: {message}", data.status),
                    None => data.status,
                });
            }
            CheckoutEvent::LineReleased(data) => self.released.push(data.item_id),
            CheckoutEvent::CheckoutPaymentFailed(data) => {
                self.state = CheckoutState::PaymentFailed;
                self.failure_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl CheckoutSaga {
    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn kind(&self) -> CheckoutKind {
        self.kind
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Lines reserved so far, in reservation order.
    pub fn reserved(&self) -> &[ReservedLine] {
        &self.reserved
    }

    pub fn reserved_line(&self, item_id: &ItemId) -> Option<&ReservedLine> {
        self.reserved.iter().find(|r| &r.item_id == item_id)
    }

    pub fn is_compensated(&self, item_id: &ItemId) -> bool {
        self.compensated.contains(item_id)
    }

    pub fn confirmed(&self) -> &[ItemId] {
        &self.confirmed
    }

    pub fn abandoned(&self) -> &[ItemId] {
        &self.abandoned
    }

    pub fn released(&self) -> &[ItemId] {
        &self.released
    }

    /// Lines not yet confirmed or given up on.
    pub fn lines_to_confirm(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|l| {
            !self.confirmed.contains(&l.item_id) && !self.abandoned.contains(&l.item_id)
        })
    }

    pub fn lines_to_release(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines
            .iter()
            .filter(|l| !self.released.contains(&l.item_id))
    }

    pub fn cart_cleared(&self) -> bool {
        self.cart_cleared
    }

    pub fn total(&self) -> Option<Money> {
        self.total
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}
