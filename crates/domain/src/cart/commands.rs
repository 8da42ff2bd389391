//! Cart commands.

use common::{AggregateId, ItemId, Money, UserId};

use crate::command::Command;

use super::Cart;

/// Add `quantity` units of a catalog item to a user's cart.
#[derive(Debug, Clone)]
pub struct AddCartItem {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl AddCartItem {
    /// One unit of the item.
    pub fn new(
        user_id: impl Into<UserId>,
        item_id: impl Into<ItemId>,
        title: impl Into<String>,
        unit_price: Money,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            title: title.into(),
            unit_price,
            quantity: 1,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
}

impl Command for AddCartItem {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(&self.user_id)
    }
}

/// Set the quantity of an existing line. Zero removes the line.
#[derive(Debug, Clone)]
pub struct UpdateCartItemQuantity {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub quantity: u32,
}

impl UpdateCartItemQuantity {
    pub fn new(user_id: impl Into<UserId>, item_id: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            quantity,
        }
    }
}

impl Command for UpdateCartItemQuantity {
    type Aggregate = Cart;

    fn aggregate_id(&self) -> AggregateId {
        Cart::id_for(&self.user_id)
    }
}
