//! Inventory for the bookstore checkout.
//!
//! The [`InventoryLedger`] is the single owner of stock counts. Every change
//! it makes is pushed through a [`StockPublisher`], which in production is
//! the [`StockNotifier`] fanning updates out to connected storefronts.
//! Attached to an event store, the ledger journals each change as a
//! [`StockEvent`] and can be restored from it.

pub mod error;
pub mod events;
pub mod ledger;
pub mod notifier;

pub use error::{LedgerError, Result};
pub use events::{STOCK_AGGREGATE, StockEvent, stock_stream_id};
pub use ledger::{Holder, InventoryLedger, StockLevel, StockRecord};
pub use notifier::{SessionId, StockNotifier, StockPublisher, StockUpdate, Subscription};
