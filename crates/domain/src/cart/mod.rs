//! The shopper's cart.
//!
//! Every unit in a cart is backed by a unit reserved in the inventory
//! ledger under the cart's holder, so adding to a cart is what keeps a
//! book from selling out under the shopper.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{Cart, CartLine};
pub use commands::{AddCartItem, UpdateCartItemQuantity};
pub use events::{
    CartClearedData, CartEvent, CartOpenedData, ItemAddedData, ItemQuantityUpdatedData,
    ItemRemovedData,
};
pub use service::{CartService, CartSummary};

use common::ItemId;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Out of stock: {item_id} has {available} units available, {requested} requested")]
    OutOfStock {
        item_id: ItemId,
        available: u32,
        requested: u32,
    },

    #[error("Item not in cart: {0}")]
    ItemNotInCart(ItemId),

    #[error("Invalid quantity: {0} (must be greater than 0)")]
    InvalidQuantity(u32),

    #[error("Invalid price: {0} cents (must be between 0 and 100000000)")]
    InvalidPrice(i64),
}
