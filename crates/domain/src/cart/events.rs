//! Cart domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, ItemId, Money, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// First item added for a user.
    CartOpened(CartOpenedData),

    /// Units of an item were added. Merges into an existing line.
    ItemAdded(ItemAddedData),

    ItemQuantityUpdated(ItemQuantityUpdatedData),

    ItemRemoved(ItemRemovedData),

    /// All lines removed. The cart itself stays.
    CartCleared(CartClearedData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::ItemAdded(_) => "CartItemAdded",
            CartEvent::ItemQuantityUpdated(_) => "CartItemQuantityUpdated",
            CartEvent::ItemRemoved(_) => "CartItemRemoved",
            CartEvent::CartCleared(_) => "CartCleared",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: AggregateId,
    pub user_id: UserId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemAddedData {
    pub item_id: ItemId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemQuantityUpdatedData {
    pub item_id: ItemId,
    pub old_quantity: u32,
    pub new_quantity: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRemovedData {
    pub item_id: ItemId,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    pub cleared_at: DateTime<Utc>,
}

impl CartEvent {
    pub fn cart_opened(cart_id: AggregateId, user_id: UserId) -> Self {
        CartEvent::CartOpened(CartOpenedData {
            cart_id,
            user_id,
            opened_at: Utc::now(),
        })
    }

    pub fn item_added(item_id: ItemId, title: String, unit_price: Money, quantity: u32) -> Self {
        CartEvent::ItemAdded(ItemAddedData {
            item_id,
            title,
            unit_price,
            quantity,
            added_at: Utc::now(),
        })
    }

    pub fn item_quantity_updated(item_id: ItemId, old_quantity: u32, new_quantity: u32) -> Self {
        CartEvent::ItemQuantityUpdated(ItemQuantityUpdatedData {
            item_id,
            old_quantity,
            new_quantity,
            updated_at: Utc::now(),
        })
    }

    pub fn item_removed(item_id: ItemId) -> Self {
        CartEvent::ItemRemoved(ItemRemovedData {
            item_id,
            removed_at: Utc::now(),
        })
    }

    pub fn cart_cleared() -> Self {
        CartEvent::CartCleared(CartClearedData {
            cleared_at: Utc::now(),
        })
    }
}
