//! Domain layer for the bookstore checkout.
//!
//! - [`Aggregate`] and [`DomainEvent`] for event-sourced entities
//! - [`CommandHandler`] to load, decide and persist
//! - the shopper's [`Cart`], whose lines are backed by stock reservations
//! - the [`Order`] record created by a checkout

pub mod aggregate;
pub mod cart;
pub mod command;
pub mod error;
pub mod order;

pub use common::Money;
pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{
    AddCartItem, Cart, CartError, CartEvent, CartLine, CartService, CartSummary,
    UpdateCartItemQuantity,
};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    CreateOrder, Order, OrderError, OrderEvent, OrderLine, OrderService, OrderStatus,
};
