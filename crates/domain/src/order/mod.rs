//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::CreateOrder;
pub use events::{
    OrderCreatedData, OrderDeliveredData, OrderDiscardedData, OrderEvent, OrderPaidData,
    OrderShippedData, PaymentFailedData, ReconciliationFlaggedData,
};
pub use service::OrderService;
pub use state::OrderStatus;
pub use value_objects::OrderLine;

use common::ItemId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order not found")]
    NotFound,

    #[error("Order was discarded")]
    Discarded,

    #[error("Order already created")]
    AlreadyCreated,

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid quantity for {item_id} (must be greater than 0)")]
    InvalidQuantity { item_id: ItemId },

    #[error("Invalid state transition: cannot {action} from {current_status}")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },
}
