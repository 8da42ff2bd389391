//! Stock events. Each item is its own stream so the ledger can be rebuilt
//! from the event store after a restart.

use common::{AggregateId, ItemId};
use serde::{Deserialize, Serialize};

use crate::ledger::Holder;

/// Stream kind of every item's stock events.
pub const STOCK_AGGREGATE: &str = "StockItem";

/// Stream an item's stock events are appended to.
pub fn stock_stream_id(item_id: &ItemId) -> AggregateId {
    AggregateId::from_natural_key("stock", item_id.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StockEvent {
    /// Always the first event of a stream.
    ItemRegistered { item_id: ItemId, units: u32 },

    Restocked { units: u32 },

    StockReserved { holder: Holder, qty: u32 },

    StockConfirmed { holder: Holder, qty: u32 },

    StockReleased { holder: Holder, qty: u32 },

    ReservationTransferred { from: Holder, to: Holder, qty: u32 },
}

impl StockEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            StockEvent::ItemRegistered { .. } => "ItemRegistered",
            StockEvent::Restocked { .. } => "ItemRestocked",
            StockEvent::StockReserved { .. } => "StockReserved",
            StockEvent::StockConfirmed { .. } => "StockConfirmed",
            StockEvent::StockReleased { .. } => "StockReleased",
            StockEvent::ReservationTransferred { .. } => "ReservationTransferred",
        }
    }
}
