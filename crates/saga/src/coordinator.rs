//! Checkout coordinator.
//!
//! Drives a checkout from the cart (or a single item) through stock
//! validation, reservation and order creation, then settles it when the
//! payment outcome arrives. Every step is recorded as a saga event before
//! the next one starts, so [`CheckoutCoordinator::resume`] can continue an
//! interrupted checkout from its last durable state.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use common::{AggregateId, ItemId, Money, UserId};
use dashmap::DashMap;
use domain::{Aggregate, CreateOrder, DomainEvent, Order, OrderLine, OrderService, OrderStatus};
use event_store::{AppendOptions, EventEnvelope, EventStore};
use inventory::{Holder, LedgerError};
use payment::{CardDetails, PaymentError, PaymentStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::aggregate::CheckoutSaga;
use crate::config::SagaConfig;
use crate::error::{Result, SagaError};
use crate::events::{CheckoutEvent, CheckoutKind};
use crate::services::{CartService, InventoryService, PaymentService};
use crate::state::CheckoutState;

/// Returned once a from-cart checkout has created its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutReceipt {
    pub checkout_id: AggregateId,
    pub order_id: AggregateId,
    pub total: Money,
    pub items_count: usize,
}

/// Payment outcome reported by the storefront after the shopper paid.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentResult {
    pub status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentResultAck {
    pub success: bool,
    pub message: String,
}

impl PaymentResultAck {
    fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
        }
    }
}

/// Legacy flow: one item, paid inline.
#[derive(Debug, Clone)]
pub struct PlaceSingleItemOrder {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub card: CardDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleItemReceipt {
    pub checkout_id: AggregateId,
    pub order_id: AggregateId,
    pub total: Money,
    pub status: OrderStatus,
    pub transaction_id: Option<String>,
}

enum Verdict {
    Approved,
    Declined,
    Unknown,
}

fn verdict(status: &str) -> Verdict {
    match status.trim().to_ascii_uppercase().as_str() {
        "APPROVED" => Verdict::Approved,
        "DECLINED" | "REJECTED" => Verdict::Declined,
        _ => Verdict::Unknown,
    }
}

/// Identifiers every step of a started checkout needs.
struct Context {
    order_id: AggregateId,
    user_id: UserId,
    order_holder: Holder,
    cart_holder: Holder,
}

impl Context {
    fn of(saga: &CheckoutSaga) -> Result<Self> {
        match (saga.order_id(), saga.user_id()) {
            (Some(order_id), Some(user_id)) => Ok(Self {
                order_id,
                user_id: user_id.clone(),
                order_holder: Holder::Order(order_id),
                cart_holder: Holder::Cart(user_id.clone()),
            }),
            _ => Err(SagaError::InvalidState {
                state: saga.state(),
                reason: "checkout was never started".to_string(),
            }),
        }
    }
}

/// Orchestrates checkouts over the ledger, the cart and the payment gate.
pub struct CheckoutCoordinator<S, I, C, P>
where
    S: EventStore,
    I: InventoryService,
    C: CartService,
    P: PaymentService,
{
    store: S,
    orders: OrderService<S>,
    inventory: I,
    carts: C,
    payments: P,
    config: SagaConfig,
    /// One from-cart checkout at a time per user.
    cart_checkouts: DashMap<UserId, Arc<Mutex<()>>>,
}

impl<S, I, C, P> CheckoutCoordinator<S, I, C, P>
where
    S: EventStore + Clone,
    I: InventoryService,
    C: CartService,
    P: PaymentService,
{
    pub fn new(store: S, inventory: I, carts: C, payments: P, config: SagaConfig) -> Self {
        let orders = OrderService::new(store.clone());
        Self {
            store,
            orders,
            inventory,
            carts,
            payments,
            config,
            cart_checkouts: DashMap::new(),
        }
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Turns the user's cart into an order awaiting payment.
    ///
    /// An empty cart fails with `EmptyCart` before anything is recorded.
    /// While an earlier checkout of the same cart awaits payment, repeating
    /// the call returns that checkout's receipt; if the cart changed since,
    /// it fails with `CheckoutPending`.
    #[tracing::instrument(skip(self), fields(checkout_id, order_id))]
    pub async fn checkout_from_cart(&self, user_id: &UserId) -> Result<CheckoutReceipt> {
        let lock = self
            .cart_checkouts
            .entry(user_id.clone())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.checkout_cart(user_id).await
        };
        drop(lock);
        self.cart_checkouts
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn checkout_cart(&self, user_id: &UserId) -> Result<CheckoutReceipt> {
        let summary = self
            .call("get_cart_items", self.carts.get_cart_items(user_id))
            .await?;
        if summary.items.is_empty() {
            return Err(SagaError::EmptyCart);
        }

        let lines: Vec<OrderLine> = summary
            .items
            .iter()
            .map(|l| OrderLine::new(l.item_id.clone(), l.title.clone(), l.quantity, l.unit_price))
            .collect();
        if let Some(receipt) = self.pending_checkout(user_id, &lines).await? {
            tracing::info!(order_id = %receipt.order_id, "Cart already awaiting payment");
            return Ok(receipt);
        }

        let started = Instant::now();
        let mut saga = self
            .start(user_id.clone(), CheckoutKind::FromCart, lines)
            .await?;

        let result = self.run_to_order(&mut saga).await;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        let order = result?;

        self.record(&mut saga, CheckoutEvent::awaiting_payment(None))
            .await?;
        tracing::info!(total = %order.total(), "Checkout awaiting payment");

        let ctx = Context::of(&saga)?;
        Ok(CheckoutReceipt {
            checkout_id: self.checkout_id(&saga)?,
            order_id: ctx.order_id,
            total: order.total(),
            items_count: order.items_count(),
        })
    }

    /// The receipt of the user's from-cart checkout that awaits payment for
    /// exactly `lines`. A waiting checkout for other lines is an error.
    async fn pending_checkout(
        &self,
        user_id: &UserId,
        lines: &[OrderLine],
    ) -> Result<Option<CheckoutReceipt>> {
        for order in self.orders.list_orders_for_user(user_id).await? {
            if order.status() != OrderStatus::Created || order.is_discarded() {
                continue;
            }
            let Some(checkout_id) = order.checkout_id() else {
                continue;
            };
            let Some(saga) = self.get_checkout(checkout_id).await? else {
                continue;
            };
            if saga.kind() != CheckoutKind::FromCart
                || saga.state() != CheckoutState::AwaitingPayment
            {
                continue;
            }
            let Some(order_id) = saga.order_id() else {
                continue;
            };

            if saga.lines() != lines {
                return Err(SagaError::CheckoutPending {
                    checkout_id,
                    order_id,
                });
            }
            return Ok(Some(CheckoutReceipt {
                checkout_id,
                order_id,
                total: order.total(),
                items_count: order.items_count(),
            }));
        }
        Ok(None)
    }

    /// Applies a payment outcome to the order's checkout.
    ///
    /// APPROVED confirms stock, clears the cart and marks the order paid.
    /// DECLINED (or REJECTED) releases stock and marks the payment failed.
    /// Any other status changes nothing and asks the caller to retry.
    /// Repeating an outcome that was already applied is a no-op success.
    #[tracing::instrument(skip(self, result), fields(status = %result.status))]
    pub async fn handle_payment_result(
        &self,
        order_id: AggregateId,
        result: PaymentResult,
    ) -> Result<PaymentResultAck> {
        let order = self
            .orders
            .handler()
            .load_existing(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;
        let checkout_id = order
            .checkout_id()
            .ok_or(SagaError::OrderNotFound(order_id))?;
        let mut saga = self
            .get_checkout(checkout_id)
            .await?
            .ok_or(SagaError::CheckoutNotFound(checkout_id))?;
        let ctx = Context::of(&saga)?;

        match verdict(&result.status) {
            Verdict::Unknown => {
                let state = saga.state();
                tracing::warn!(%order_id, %state, "Unrecognized payment status ignored");
                let message = if state == CheckoutState::AwaitingPayment {
                    format!(
                        "Unrecognized payment status '{}'; order is still awaiting payment, retry with APPROVED or DECLINED",
                        result.status
                    )
                } else {
                    format!(
                        "Unrecognized payment status '{}'; checkout is already {state}",
                        result.status
                    )
                };
                Ok(PaymentResultAck::new(false, message))
            }
            Verdict::Approved => match saga.state() {
                CheckoutState::AwaitingPayment => {
                    self.record(&mut saga, CheckoutEvent::payment_approved(result.transaction_id))
                        .await?;
                    self.settle_approved(&mut saga, &ctx).await
                }
                CheckoutState::Confirming => self.settle_approved(&mut saga, &ctx).await,
                CheckoutState::Paid | CheckoutState::ReconciliationRequired => Ok(
                    PaymentResultAck::new(true, "Payment already recorded as approved"),
                ),
                state => Err(SagaError::InvalidState {
                    state,
                    reason: "cannot accept an approved payment".to_string(),
                }),
            },
            Verdict::Declined => match saga.state() {
                CheckoutState::AwaitingPayment => {
                    self.record(
                        &mut saga,
                        CheckoutEvent::payment_declined(result.status, result.message),
                    )
                    .await?;
                    self.settle_declined(&mut saga, &ctx).await
                }
                CheckoutState::Releasing => self.settle_declined(&mut saga, &ctx).await,
                CheckoutState::PaymentFailed => Ok(PaymentResultAck::new(
                    true,
                    "Payment already recorded as declined",
                )),
                state => Err(SagaError::InvalidState {
                    state,
                    reason: "cannot accept a declined payment".to_string(),
                }),
            },
        }
    }

    /// Single-item order paid inline. A payment that is not approved
    /// releases the stock, discards the order and fails with
    /// `PaymentDeclined`.
    #[tracing::instrument(
        skip(self, request),
        fields(user_id = %request.user_id, item_id = %request.item_id, checkout_id, order_id)
    )]
    pub async fn place_single_item_order(
        &self,
        request: PlaceSingleItemOrder,
    ) -> Result<SingleItemReceipt> {
        if request.quantity == 0 {
            return Err(LedgerError::InvalidQuantity.into());
        }
        if !request.unit_price.is_positive() || !request.unit_price.is_valid_unit_price() {
            return Err(PaymentError::InvalidAmount(request.unit_price.cents()).into());
        }
        request.card.validate()?;

        let started = Instant::now();
        let line = OrderLine::new(
            request.item_id.clone(),
            request.title.clone(),
            request.quantity,
            request.unit_price,
        );
        let mut saga = self
            .start(request.user_id.clone(), CheckoutKind::SingleItem, vec![line])
            .await?;
        let ctx = Context::of(&saga)?;
        let checkout_id = self.checkout_id(&saga)?;

        let result = self.run_to_order(&mut saga).await;
        let order = match result {
            Ok(order) => order,
            Err(e) => {
                metrics::histogram!("checkout_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                return Err(e);
            }
        };
        let total = order.total();

        let description = format!("Order {} ({} x {})", ctx.order_id, request.quantity, request.title);
        let reference = self
            .call(
                "create_payment",
                self.payments.create_payment(ctx.order_id, total, description),
            )
            .await;

        let outcome = match reference {
            Ok(reference) => {
                self.record(&mut saga, CheckoutEvent::awaiting_payment(Some(reference.clone())))
                    .await?;
                self.call(
                    "process_payment",
                    self.payments.process_payment(&reference, &request.card),
                )
                .await
            }
            Err(e) => Err(e),
        };

        let (status, transaction_id, message) = match outcome {
            Ok(outcome) => (outcome.status, outcome.transaction_id, outcome.message),
            Err(e) => {
                tracing::warn!(error = %e, "Inline payment failed");
                (PaymentStatus::Error, None, Some(e.to_string()))
            }
        };

        let settled = if status == PaymentStatus::Approved {
            self.record(&mut saga, CheckoutEvent::payment_approved(transaction_id.clone()))
                .await?;
            self.settle_approved(&mut saga, &ctx).await.map(|_| ())
        } else {
            self.record(
                &mut saga,
                CheckoutEvent::payment_declined(status.as_str(), message.clone()),
            )
            .await?;
            self.settle_declined(&mut saga, &ctx).await.map(|_| ())
        };
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        settled?;

        if status != PaymentStatus::Approved {
            return Err(SagaError::PaymentDeclined {
                status: status.to_string(),
                message: message.unwrap_or_default(),
            });
        }

        Ok(SingleItemReceipt {
            checkout_id,
            order_id: ctx.order_id,
            total,
            status: OrderStatus::Paid,
            transaction_id,
        })
    }

    /// Continues a checkout from its last recorded state.
    ///
    /// Checkouts that never created their order are compensated and
    /// aborted; ones mid-settlement finish confirming or releasing the
    /// lines not yet handled. Terminal and awaiting checkouts are left as
    /// they are.
    #[tracing::instrument(skip(self))]
    pub async fn resume(&self, checkout_id: AggregateId) -> Result<CheckoutSaga> {
        let mut saga = self
            .get_checkout(checkout_id)
            .await?
            .ok_or(SagaError::CheckoutNotFound(checkout_id))?;
        let ctx = Context::of(&saga)?;

        match saga.state() {
            CheckoutState::Started | CheckoutState::StockValidated => {
                self.abort(&mut saga, &ctx, "interrupted before the order was created")
                    .await;
            }
            CheckoutState::Reserved => match self.orders.get_order(ctx.order_id).await? {
                Some(order) => {
                    self.record(&mut saga, CheckoutEvent::order_persisted(order.total()))
                        .await?;
                    self.record(&mut saga, CheckoutEvent::awaiting_payment(None))
                        .await?;
                }
                None => {
                    self.abort(&mut saga, &ctx, "interrupted before the order was created")
                        .await;
                }
            },
            CheckoutState::OrderPersisted => {
                self.record(&mut saga, CheckoutEvent::awaiting_payment(None))
                    .await?;
            }
            CheckoutState::Confirming => {
                self.settle_approved(&mut saga, &ctx).await?;
            }
            CheckoutState::Releasing => {
                self.settle_declined(&mut saga, &ctx).await?;
            }
            CheckoutState::AwaitingPayment
            | CheckoutState::Paid
            | CheckoutState::PaymentFailed
            | CheckoutState::Aborted
            | CheckoutState::ReconciliationRequired => {}
        }

        tracing::info!(state = %saga.state(), "Checkout resumed");
        Ok(saga)
    }

    /// Resumes every checkout that is neither terminal nor waiting for its
    /// payment. Returns how many were resumed.
    pub async fn resume_incomplete(&self) -> Result<usize> {
        let ids = self
            .store
            .get_aggregate_ids(CheckoutSaga::aggregate_type())
            .await?;

        let mut resumed = 0;
        for checkout_id in ids {
            let Some(saga) = self.get_checkout(checkout_id).await? else {
                continue;
            };
            if saga.state().is_terminal() || saga.state() == CheckoutState::AwaitingPayment {
                continue;
            }
            match self.resume(checkout_id).await {
                Ok(_) => resumed += 1,
                Err(e) => {
                    tracing::error!(%checkout_id, error = %e, "Failed to resume checkout");
                }
            }
        }

        if resumed > 0 {
            tracing::info!(resumed, "Resumed incomplete checkouts");
        }
        Ok(resumed)
    }

    /// Rebuilds a checkout from its events.
    pub async fn get_checkout(&self, checkout_id: AggregateId) -> Result<Option<CheckoutSaga>> {
        let events = self.store.get_events_for_aggregate(checkout_id).await?;
        if events.is_empty() {
            return Ok(None);
        }

        let mut saga = CheckoutSaga::default();
        for envelope in events {
            let event: CheckoutEvent = serde_json::from_value(envelope.payload)?;
            saga.apply(event);
            saga.set_version(envelope.version);
        }
        Ok(Some(saga))
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>> {
        Ok(self.orders.get_order(order_id).await?)
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.orders.list_orders().await?)
    }

    pub async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        Ok(self.orders.list_orders_for_user(user_id).await?)
    }

    /// Fulfilment transition set by hand: SHIPPED after PAID, DELIVERED
    /// after SHIPPED.
    pub async fn update_order_status(
        &self,
        order_id: AggregateId,
        status: OrderStatus,
    ) -> Result<Order> {
        if self.orders.get_order(order_id).await?.is_none() {
            return Err(SagaError::OrderNotFound(order_id));
        }
        Ok(self.orders.update_status(order_id, status).await?.aggregate)
    }

    async fn start(
        &self,
        user_id: UserId,
        kind: CheckoutKind,
        lines: Vec<OrderLine>,
    ) -> Result<CheckoutSaga> {
        let checkout_id = AggregateId::new();
        let order_id = AggregateId::new();

        let mut saga = CheckoutSaga::default();
        self.record(
            &mut saga,
            CheckoutEvent::checkout_started(checkout_id, order_id, user_id, kind, lines),
        )
        .await?;

        let span = tracing::Span::current();
        span.record("checkout_id", tracing::field::display(checkout_id));
        span.record("order_id", tracing::field::display(order_id));
        metrics::counter!("checkout_started_total").increment(1);
        tracing::info!(lines = saga.lines().len(), "Checkout started");
        Ok(saga)
    }

    /// Validate, reserve and persist the order. Anything that fails before
    /// the order exists is compensated and the checkout aborted.
    async fn run_to_order(&self, saga: &mut CheckoutSaga) -> Result<Order> {
        let ctx = Context::of(saga)?;

        if let Err(e) = self.validate_stock(saga, &ctx).await {
            self.abort(saga, &ctx, &e.to_string()).await;
            return Err(e);
        }
        if let Err(e) = self.reserve_lines(saga, &ctx).await {
            self.abort(saga, &ctx, &e.to_string()).await;
            return Err(e);
        }

        let checkout_id = self.checkout_id(saga)?;
        let cmd = CreateOrder::new(
            ctx.order_id,
            checkout_id,
            ctx.user_id.clone(),
            saga.lines().to_vec(),
        );
        let order = match self.orders.create_order(cmd).await {
            Ok(result) => result.aggregate,
            Err(e) => {
                let e = SagaError::from(e);
                self.abort(saga, &ctx, &e.to_string()).await;
                return Err(e);
            }
        };

        self.record(saga, CheckoutEvent::order_persisted(order.total()))
            .await?;
        Ok(order)
    }

    /// A line passes when what is available plus what the user's cart
    /// already holds covers its quantity.
    async fn validate_stock(&self, saga: &mut CheckoutSaga, ctx: &Context) -> Result<()> {
        for line in saga.lines().to_vec() {
            let level = self
                .call("check_stock", self.inventory.check_stock(&line.item_id))
                .await?;
            let held = match saga.kind() {
                CheckoutKind::FromCart => {
                    self.call(
                        "held_by",
                        self.inventory.held_by(&line.item_id, &ctx.cart_holder),
                    )
                    .await?
                }
                CheckoutKind::SingleItem => 0,
            };

            let available = level.available_units.saturating_add(held);
            if available < line.quantity {
                return Err(SagaError::InsufficientStock {
                    item_id: line.item_id,
                    available,
                    requested: line.quantity,
                });
            }
        }

        self.record(saga, CheckoutEvent::stock_validated()).await
    }

    /// Reserves every line in order under the order's holder.
    async fn reserve_lines(&self, saga: &mut CheckoutSaga, ctx: &Context) -> Result<()> {
        for line in saga.lines().to_vec() {
            if saga.reserved_line(&line.item_id).is_some() {
                continue;
            }
            let (taken_over, reserved) = self.reserve_line(saga.kind(), ctx, &line).await?;
            tracing::debug!(item_id = %line.item_id, taken_over, reserved, "Line reserved");
            self.record(
                saga,
                CheckoutEvent::line_reserved(line.item_id, taken_over, reserved),
            )
            .await?;
        }

        self.record(saga, CheckoutEvent::reservations_completed())
            .await
    }

    /// Takes over the cart's holding for the line, then reserves the
    /// shortfall. A failed shortfall reservation hands the taken units back
    /// to the cart.
    async fn reserve_line(
        &self,
        kind: CheckoutKind,
        ctx: &Context,
        line: &OrderLine,
    ) -> Result<(u32, u32)> {
        let failed = |e: SagaError| SagaError::ReservationFailed {
            item_id: line.item_id.clone(),
            reason: e.to_string(),
        };

        let taken_over = match kind {
            CheckoutKind::FromCart => self
                .call(
                    "transfer_reservation",
                    self.inventory.transfer_reservation(
                        &line.item_id,
                        &ctx.cart_holder,
                        &ctx.order_holder,
                        line.quantity,
                    ),
                )
                .await
                .map_err(failed)?,
            CheckoutKind::SingleItem => 0,
        };

        let shortfall = line.quantity.saturating_sub(taken_over);
        if shortfall > 0
            && let Err(e) = self
                .call(
                    "reserve_stock",
                    self.inventory
                        .reserve_stock(&line.item_id, &ctx.order_holder, shortfall),
                )
                .await
        {
            if taken_over > 0
                && let Err(back) = self
                    .call(
                        "transfer_reservation",
                        self.inventory.transfer_reservation(
                            &line.item_id,
                            &ctx.order_holder,
                            &ctx.cart_holder,
                            taken_over,
                        ),
                    )
                    .await
            {
                tracing::error!(item_id = %line.item_id, error = %back, "Failed to hand units back to the cart");
            }
            return Err(failed(e));
        }

        Ok((taken_over, shortfall))
    }

    /// Undoes every reservation the order holds, last line first. Units
    /// taken over from the cart go back to the cart; the rest is released.
    /// Failures are logged and recorded, never raised.
    async fn compensate_reservations(&self, saga: &mut CheckoutSaga, ctx: &Context) {
        let lines: Vec<OrderLine> = saga.lines().iter().rev().cloned().collect();

        for line in lines {
            if saga.is_compensated(&line.item_id) {
                continue;
            }
            let taken_over = saga
                .reserved_line(&line.item_id)
                .map(|r| r.taken_over)
                .unwrap_or(0);

            let event = match self.compensate_line(ctx, &line.item_id, taken_over).await {
                Ok(None) => continue,
                Ok(Some((returned, released))) => {
                    tracing::warn!(item_id = %line.item_id, returned, released, "Reservation compensated");
                    CheckoutEvent::line_compensated(line.item_id, returned, released)
                }
                Err(e) => {
                    metrics::counter!("checkout_compensation_failures_total").increment(1);
                    tracing::error!(item_id = %line.item_id, error = %e, "Compensation failed");
                    CheckoutEvent::compensation_failed(line.item_id, e)
                }
            };
            self.record_quietly(saga, event).await;
        }
    }

    async fn compensate_line(
        &self,
        ctx: &Context,
        item_id: &ItemId,
        taken_over: u32,
    ) -> Result<Option<(u32, u32)>> {
        let held = self
            .call("held_by", self.inventory.held_by(item_id, &ctx.order_holder))
            .await?;
        if held == 0 {
            return Ok(None);
        }

        let to_cart = taken_over.min(held);
        let returned = if to_cart > 0 {
            self.call(
                "transfer_reservation",
                self.inventory
                    .transfer_reservation(item_id, &ctx.order_holder, &ctx.cart_holder, to_cart),
            )
            .await?
        } else {
            0
        };

        let released = held - returned;
        if released > 0 {
            self.call(
                "release_stock",
                self.inventory
                    .release_stock(item_id, &ctx.order_holder, released),
            )
            .await?;
        }
        Ok(Some((returned, released)))
    }

    async fn abort(&self, saga: &mut CheckoutSaga, ctx: &Context, reason: &str) {
        self.compensate_reservations(saga, ctx).await;
        self.record_quietly(saga, CheckoutEvent::checkout_aborted(reason))
            .await;
        metrics::counter!("checkout_failed_total", "stage" => "reservation").increment(1);
        tracing::warn!(%reason, "Checkout aborted");
    }

    /// Confirms every remaining line, clears the cart and marks the order
    /// paid. Lines that cannot be confirmed flag the order for
    /// reconciliation instead of undoing the sale.
    async fn settle_approved(
        &self,
        saga: &mut CheckoutSaga,
        ctx: &Context,
    ) -> Result<PaymentResultAck> {
        let remaining: Vec<OrderLine> = saga.lines_to_confirm().cloned().collect();
        for line in remaining {
            match self.confirm_with_retry(ctx, &line).await {
                Ok(()) => {
                    self.record(saga, CheckoutEvent::line_confirmed(line.item_id))
                        .await?
                }
                Err(e) => {
                    tracing::error!(item_id = %line.item_id, error = %e, "Giving up on stock confirmation");
                    self.record(saga, CheckoutEvent::confirm_abandoned(line.item_id, e))
                        .await?;
                }
            }
        }

        let reconciliation = (!saga.abandoned().is_empty()).then(|| {
            let items: Vec<String> = saga.abandoned().iter().map(ToString::to_string).collect();
            format!("stock confirmation failed for {}", items.join(", "))
        });
        if let Some(reason) = &reconciliation {
            self.orders
                .flag_for_reconciliation(ctx.order_id, reason.clone())
                .await?;
        }

        if saga.kind() == CheckoutKind::FromCart && !saga.cart_cleared() {
            match self
                .call("clear_cart", self.carts.clear_cart(&ctx.user_id))
                .await
            {
                Ok(()) => self.record(saga, CheckoutEvent::cart_cleared()).await?,
                Err(e) => {
                    tracing::error!(user_id = %ctx.user_id, error = %e, "Failed to clear cart after payment");
                }
            }
        }

        let transaction_id = saga.transaction_id().map(str::to_owned);
        self.orders
            .mark_paid(ctx.order_id, transaction_id.clone())
            .await?;

        match reconciliation {
            Some(reason) => {
                self.record(saga, CheckoutEvent::reconciliation_required(reason))
                    .await?;
                metrics::counter!("checkout_reconciliation_required_total").increment(1);
                Ok(PaymentResultAck::new(
                    true,
                    "Payment approved; order flagged for stock reconciliation",
                ))
            }
            None => {
                self.record(saga, CheckoutEvent::checkout_paid(transaction_id))
                    .await?;
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(order_id = %ctx.order_id, "Checkout paid");
                Ok(PaymentResultAck::new(true, "Payment approved; order paid"))
            }
        }
    }

    async fn confirm_with_retry(&self, ctx: &Context, line: &OrderLine) -> Result<()> {
        let max_attempts = self.config.confirm_max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = self
                .call(
                    "confirm_stock_reduction",
                    self.inventory.confirm_stock_reduction(
                        &line.item_id,
                        &ctx.order_holder,
                        line.quantity,
                    ),
                )
                .await;
            match result {
                Ok(_) => return Ok(()),
                Err(e) if attempt < max_attempts => {
                    metrics::counter!("checkout_confirm_retries_total").increment(1);
                    tracing::warn!(item_id = %line.item_id, attempt, error = %e, "Confirm failed, retrying");
                    tokio::time::sleep(self.config.confirm_retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Releases every remaining line and records the failed payment. The
    /// single-item flow discards its order; a cart checkout keeps it as
    /// PAYMENT_FAILED and leaves the cart alone.
    async fn settle_declined(
        &self,
        saga: &mut CheckoutSaga,
        ctx: &Context,
    ) -> Result<PaymentResultAck> {
        let remaining: Vec<OrderLine> = saga.lines_to_release().cloned().collect();
        for line in remaining {
            match self.release_line(ctx, &line).await {
                Ok(released) => {
                    tracing::debug!(item_id = %line.item_id, released, "Line released");
                    self.record(saga, CheckoutEvent::line_released(line.item_id))
                        .await?;
                }
                Err(e) => {
                    metrics::counter!("checkout_compensation_failures_total").increment(1);
                    tracing::error!(item_id = %line.item_id, error = %e, "Failed to release stock after decline");
                    self.record(saga, CheckoutEvent::compensation_failed(line.item_id, e))
                        .await?;
                }
            }
        }

        let reason = saga
            .failure_reason()
            .unwrap_or("payment declined")
            .to_string();
        match saga.kind() {
            CheckoutKind::FromCart => {
                self.orders
                    .mark_payment_failed(ctx.order_id, Some(reason.clone()))
                    .await?;
            }
            CheckoutKind::SingleItem => {
                self.orders
                    .discard_order(ctx.order_id, reason.clone())
                    .await?;
            }
        }

        self.record(saga, CheckoutEvent::checkout_payment_failed(reason))
            .await?;
        metrics::counter!("checkout_failed_total", "stage" => "payment").increment(1);
        tracing::warn!(order_id = %ctx.order_id, "Checkout payment failed, stock released");
        Ok(PaymentResultAck::new(
            true,
            "Payment declined; reserved stock released",
        ))
    }

    /// Releases what the order still holds for the line. Holding nothing
    /// (already released) is success.
    async fn release_line(&self, ctx: &Context, line: &OrderLine) -> Result<u32> {
        let held = self
            .call("held_by", self.inventory.held_by(&line.item_id, &ctx.order_holder))
            .await?;
        let qty = held.min(line.quantity);
        if qty > 0 {
            self.call(
                "release_stock",
                self.inventory
                    .release_stock(&line.item_id, &ctx.order_holder, qty),
            )
            .await?;
        }
        Ok(qty)
    }

    /// Runs a downstream call under the configured timeout.
    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.rpc_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                metrics::counter!("checkout_rpc_timeouts_total", "operation" => operation)
                    .increment(1);
                tracing::warn!(operation, "Downstream call timed out");
                Err(SagaError::Unavailable(format!(
                    "{operation} timed out after {:?}",
                    self.config.rpc_timeout
                )))
            }
        }
    }

    fn checkout_id(&self, saga: &CheckoutSaga) -> Result<AggregateId> {
        saga.id().ok_or(SagaError::InvalidState {
            state: saga.state(),
            reason: "checkout was never started".to_string(),
        })
    }

    /// Appends one saga event with an optimistic version check, then applies
    /// it.
    async fn record(&self, saga: &mut CheckoutSaga, event: CheckoutEvent) -> Result<()> {
        let checkout_id = match (&event, saga.id()) {
            (_, Some(id)) => id,
            (CheckoutEvent::CheckoutStarted(data), None) => data.checkout_id,
            (_, None) => return self.checkout_id(saga).map(|_| ()),
        };

        let current = saga.version();
        let envelope = EventEnvelope::new(
            checkout_id,
            CheckoutSaga::aggregate_type(),
            current.next(),
            event.event_type(),
            &event,
        )?;
        let new_version = self
            .store
            .append(vec![envelope], AppendOptions::expect_version(current))
            .await?;

        saga.apply(event);
        saga.set_version(new_version);
        Ok(())
    }

    async fn record_quietly(&self, saga: &mut CheckoutSaga, event: CheckoutEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.record(saga, event).await {
            tracing::error!(event_type, error = %e, "Failed to record checkout event");
        }
    }
}
