//! Checkout saga for the bookstore.
//!
//! A checkout moves a user's cart (or a single item) through:
//! 1. stock validation
//! 2. reservation of every line under the order's holder
//! 3. order creation
//! 4. settlement once the payment outcome is known
//!
//! A failure before the order exists compensates the reservations already
//! made. After approval, stock confirmation is retried and never rolled
//! back; lines that cannot be confirmed flag the order for reconciliation.

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod services;
pub mod state;

pub use aggregate::{CheckoutSaga, ReservedLine};
pub use config::SagaConfig;
pub use coordinator::{
    CheckoutCoordinator, CheckoutReceipt, PaymentResult, PaymentResultAck, PlaceSingleItemOrder,
    SingleItemReceipt,
};
pub use error::{Result, SagaError};
pub use events::{CheckoutEvent, CheckoutKind};
pub use services::{CartService, InventoryService, PaymentService};
pub use state::CheckoutState;
