//! Order commands.

use common::{AggregateId, UserId};

use crate::command::Command;

use super::{Order, OrderLine};

/// Persist a new order for a checkout.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: AggregateId,
    pub checkout_id: AggregateId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
}

impl CreateOrder {
    pub fn new(
        order_id: AggregateId,
        checkout_id: AggregateId,
        user_id: impl Into<UserId>,
        lines: Vec<OrderLine>,
    ) -> Self {
        Self {
            order_id,
            checkout_id,
            user_id: user_id.into(),
            lines,
        }
    }
}

impl Command for CreateOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
