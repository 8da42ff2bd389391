//! Order service wrapping the command handler.

use common::{AggregateId, UserId};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{CreateOrder, Order, OrderEvent, OrderStatus};

/// Persists orders and their status changes.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, user_id = %cmd.user_id))]
    pub async fn create_order(
        &self,
        cmd: CreateOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        let order_id = cmd.aggregate_id();
        let CreateOrder {
            checkout_id,
            user_id,
            lines,
            ..
        } = cmd;

        let result = self
            .handler
            .execute(order_id, |order| {
                order.create(order_id, checkout_id, user_id, lines)
            })
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(total = %result.aggregate.total(), "Order created");
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_paid(
        &self,
        order_id: AggregateId,
        transaction_id: Option<String>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(order_id, |order| order.mark_paid(transaction_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_payment_failed(
        &self,
        order_id: AggregateId,
        reason: Option<String>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(order_id, |order| order.mark_payment_failed(reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn flag_for_reconciliation(
        &self,
        order_id: AggregateId,
        reason: String,
    ) -> Result<CommandResult<Order>, DomainError> {
        tracing::error!(%reason, "Order flagged for manual reconciliation");
        self.handler
            .execute(order_id, |order| order.flag_for_reconciliation(reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: AggregateId,
        status: OrderStatus,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(order_id, |order| order.update_status(status))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn discard_order(
        &self,
        order_id: AggregateId,
        reason: String,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(order_id, |order| order.discard(reason))
            .await
    }

    /// Loads an order. Discarded and unknown orders are `None`.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        Ok(self
            .handler
            .load_existing(order_id)
            .await?
            .filter(|order| !order.is_discarded()))
    }

    /// Every live order, oldest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        let ids = self
            .handler
            .store()
            .get_aggregate_ids(Order::aggregate_type())
            .await?;
        self.load_live(ids).await
    }

    /// Orders placed by one user, oldest first.
    pub async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, DomainError> {
        let created = self.handler.store().get_events_by_type("OrderCreated").await?;

        let mut ids = Vec::new();
        for envelope in created {
            let event: OrderEvent = serde_json::from_value(envelope.payload)?;
            if let OrderEvent::OrderCreated(data) = event
                && &data.user_id == user_id
            {
                ids.push(data.order_id);
            }
        }
        self.load_live(ids).await
    }

    async fn load_live(&self, ids: Vec<AggregateId>) -> Result<Vec<Order>, DomainError> {
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = self.get_order(id).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}
