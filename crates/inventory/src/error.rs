use common::ItemId;
use thiserror::Error;

/// Errors returned by ledger operations. A failed operation never mutates
/// the stock record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("Quantity must be greater than zero")]
    InvalidQuantity,

    #[error("Insufficient stock for {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: ItemId,
        available: u32,
        requested: u32,
    },

    /// The holder asked to confirm or release more units than it holds.
    #[error("Holder has {held} units of {item_id} reserved, cannot settle {requested}")]
    ExceedsReservation {
        item_id: ItemId,
        held: u32,
        requested: u32,
    },

    /// The stock change could not be written to the event store.
    #[error("Stock journal unavailable: {0}")]
    Journal(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
