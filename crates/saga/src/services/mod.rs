//! Seams between the checkout coordinator and the components it drives.
//!
//! Each trait is implemented for the in-process component and for `Arc` of
//! any implementation, so tests can wrap a component to inject faults.

pub mod cart;
pub mod inventory;
pub mod payment;

pub use cart::CartService;
pub use inventory::InventoryService;
pub use payment::PaymentService;
