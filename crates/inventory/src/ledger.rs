use std::collections::HashMap;
use std::sync::Arc;

use common::{AggregateId, ItemId, UserId};
use dashmap::DashMap;
use event_store::{AppendOptions, EventEnvelope, EventStore, EventStoreError, Version};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{LedgerError, Result};
use crate::events::{STOCK_AGGREGATE, StockEvent, stock_stream_id};
use crate::notifier::StockPublisher;

/// Who owns a block of reserved units.
///
/// Units a shopper adds to their cart are held by the cart; a checkout takes
/// them over for its order before payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Holder {
    Cart(UserId),
    Order(AggregateId),
}

impl std::fmt::Display for Holder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Holder::Cart(user_id) => write!(f, "cart:{user_id}"),
            Holder::Order(order_id) => write!(f, "order:{order_id}"),
        }
    }
}

/// Result of a stock read or of a successful stock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item_id: ItemId,
    pub in_stock: bool,
    pub available_units: u32,
}

/// Full view of one item's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub item_id: ItemId,
    pub available_units: u32,
    pub reserved_units: u32,
    pub sold_units: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct Holding {
    held: u32,
    confirmed: u32,
}

#[derive(Debug, Default)]
struct StockEntry {
    available: u32,
    sold: u32,
    holdings: HashMap<Holder, Holding>,
    /// Last journaled event applied to this entry.
    version: Version,
}

impl StockEntry {
    fn reserved(&self) -> u32 {
        self.holdings.values().map(|h| h.held).sum()
    }

    fn held_by(&self, holder: &Holder) -> u32 {
        self.holdings.get(holder).map(|h| h.held).unwrap_or(0)
    }

    fn prune(&mut self, holder: &Holder) {
        if let Some(h) = self.holdings.get(holder)
            && h.held == 0
            && h.confirmed == 0
        {
            self.holdings.remove(holder);
        }
    }

    /// Applies an already validated event. Also used for replay.
    fn apply(&mut self, event: &StockEvent) {
        match event {
            StockEvent::ItemRegistered { units, .. } => {
                self.available = *units;
            }
            StockEvent::Restocked { units } => {
                self.available = self.available.saturating_add(*units);
            }
            StockEvent::StockReserved { holder, qty } => {
                self.available = self.available.saturating_sub(*qty);
                self.holdings.entry(holder.clone()).or_default().held += qty;
            }
            StockEvent::StockConfirmed { holder, qty } => {
                let h = self.holdings.entry(holder.clone()).or_default();
                h.held = h.held.saturating_sub(*qty);
                h.confirmed += qty;
                self.sold += qty;
            }
            StockEvent::StockReleased { holder, qty } => {
                if let Some(h) = self.holdings.get_mut(holder) {
                    h.held = h.held.saturating_sub(*qty);
                }
                self.prune(holder);
                self.available = self.available.saturating_add(*qty);
            }
            StockEvent::ReservationTransferred { from, to, qty } => {
                if let Some(h) = self.holdings.get_mut(from) {
                    h.held = h.held.saturating_sub(*qty);
                }
                self.prune(from);
                self.holdings.entry(to.clone()).or_default().held += qty;
            }
        }
    }
}

fn journal_error(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Journal(e.to_string())
}

/// Per-item stock records with holder-scoped reservations.
///
/// Each item sits behind its own async mutex, so operations on one item are
/// serialized while different items proceed in parallel. There is no
/// cross-item atomicity.
///
/// With a journal attached every change is appended to the item's event
/// stream before it is applied, and [`InventoryLedger::restore`] rebuilds
/// the records after a restart.
#[derive(Clone)]
pub struct InventoryLedger {
    items: Arc<DashMap<ItemId, Arc<Mutex<StockEntry>>>>,
    publisher: Option<Arc<dyn StockPublisher>>,
    journal: Option<Arc<dyn EventStore>>,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryLedger {
    /// Creates an in-memory ledger that publishes nothing.
    pub fn new() -> Self {
        Self {
            items: Arc::new(DashMap::new()),
            publisher: None,
            journal: None,
        }
    }

    /// Creates a ledger that reports every stock change to `publisher`.
    pub fn with_publisher(publisher: Arc<dyn StockPublisher>) -> Self {
        Self {
            publisher: Some(publisher),
            ..Self::new()
        }
    }

    /// Persists every stock change to `journal`.
    pub fn with_journal(mut self, journal: Arc<dyn EventStore>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Rebuilds every item recorded in the journal, replacing what is in
    /// memory for those items. Returns how many items were restored.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> Result<usize> {
        let Some(journal) = &self.journal else {
            return Ok(0);
        };

        let streams = journal
            .get_aggregate_ids(STOCK_AGGREGATE)
            .await
            .map_err(journal_error)?;
        let mut restored = 0;
        for stream_id in streams {
            let mut stock = StockEntry::default();
            let mut item_id = None;
            for envelope in journal
                .get_events_for_aggregate(stream_id)
                .await
                .map_err(journal_error)?
            {
                let event: StockEvent =
                    serde_json::from_value(envelope.payload).map_err(journal_error)?;
                if let StockEvent::ItemRegistered { item_id: id, .. } = &event {
                    item_id = Some(id.clone());
                }
                stock.apply(&event);
                stock.version = envelope.version;
            }

            let Some(item_id) = item_id else {
                tracing::warn!(%stream_id, "Stock stream without registration, skipped");
                continue;
            };
            tracing::debug!(%item_id, available = stock.available, sold = stock.sold, "Stock restored");
            self.items.insert(item_id, Arc::new(Mutex::new(stock)));
            restored += 1;
        }

        tracing::info!(restored, "Inventory restored from journal");
        Ok(restored)
    }

    fn entry(&self, item_id: &ItemId) -> Option<Arc<Mutex<StockEntry>>> {
        self.items.get(item_id).map(|e| Arc::clone(e.value()))
    }

    fn require(&self, item_id: &ItemId) -> Result<Arc<Mutex<StockEntry>>> {
        self.entry(item_id)
            .ok_or_else(|| LedgerError::UnknownItem(item_id.clone()))
    }

    fn publish(&self, item_id: &ItemId, available_units: u32) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(item_id, available_units);
        }
    }

    fn level(item_id: &ItemId, available: u32) -> StockLevel {
        StockLevel {
            item_id: item_id.clone(),
            in_stock: available > 0,
            available_units: available,
        }
    }

    /// Journals `event` and then applies it. A failed append leaves the
    /// record untouched.
    async fn commit(&self, item_id: &ItemId, stock: &mut StockEntry, event: StockEvent) -> Result<()> {
        if let Some(journal) = &self.journal {
            let envelope = EventEnvelope::new(
                stock_stream_id(item_id),
                STOCK_AGGREGATE,
                stock.version.next(),
                event.event_type(),
                &event,
            )
            .map_err(journal_error)?;

            match journal
                .append(vec![envelope], AppendOptions::expect_version(stock.version))
                .await
            {
                Ok(version) => stock.version = version,
                Err(e) => {
                    if matches!(e, EventStoreError::ConcurrencyConflict { .. }) {
                        self.catch_up(item_id, stock).await;
                    }
                    tracing::error!(%item_id, error = %e, "Failed to journal stock change");
                    return Err(journal_error(e));
                }
            }
        }

        stock.apply(&event);
        Ok(())
    }

    /// Applies events the journal has beyond the in-memory version.
    async fn catch_up(&self, item_id: &ItemId, stock: &mut StockEntry) {
        let Some(journal) = &self.journal else {
            return;
        };
        let events = match journal.get_events_for_aggregate(stock_stream_id(item_id)).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(%item_id, error = %e, "Failed to reload stock stream");
                return;
            }
        };
        for envelope in events {
            if !(envelope.version > stock.version) {
                continue;
            }
            match serde_json::from_value::<StockEvent>(envelope.payload) {
                Ok(event) => {
                    stock.apply(&event);
                    stock.version = envelope.version;
                }
                Err(e) => {
                    tracing::error!(%item_id, error = %e, "Unreadable stock event");
                    return;
                }
            }
        }
    }

    /// Creates the record for a new catalog item. Returns `false` without
    /// touching stock when the item is already registered.
    #[tracing::instrument(skip(self))]
    pub async fn register_item(&self, item_id: ItemId, units: u32) -> Result<bool> {
        if self.items.contains_key(&item_id) {
            return Ok(false);
        }

        let mut stock = StockEntry::default();
        let event = StockEvent::ItemRegistered {
            item_id: item_id.clone(),
            units,
        };
        match self.commit(&item_id, &mut stock, event).await {
            Ok(()) => {}
            // Registered by another writer first.
            Err(_) if self.items.contains_key(&item_id) => return Ok(false),
            Err(e) => return Err(e),
        }

        let mut created = false;
        self.items.entry(item_id.clone()).or_insert_with(|| {
            created = true;
            Arc::new(Mutex::new(stock))
        });

        if created {
            tracing::info!(units, "Item registered");
            self.publish(&item_id, units);
        }
        Ok(created)
    }

    /// Adds units to an existing item's available stock.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, item_id: &ItemId, units: u32) -> Result<StockLevel> {
        let entry = self.require(item_id)?;
        let mut stock = entry.lock().await;
        self.commit(item_id, &mut stock, StockEvent::Restocked { units })
            .await?;

        tracing::info!(available = stock.available, "Item restocked");
        self.publish(item_id, stock.available);
        Ok(Self::level(item_id, stock.available))
    }

    /// Reads the current availability. Unknown items read as out of stock.
    pub async fn check_stock(&self, item_id: &ItemId) -> StockLevel {
        match self.entry(item_id) {
            Some(entry) => {
                let stock = entry.lock().await;
                Self::level(item_id, stock.available)
            }
            None => Self::level(item_id, 0),
        }
    }

    /// Returns the full record, or `None` for an unknown item.
    pub async fn snapshot(&self, item_id: &ItemId) -> Option<StockRecord> {
        let entry = self.entry(item_id)?;
        let stock = entry.lock().await;
        Some(StockRecord {
            item_id: item_id.clone(),
            available_units: stock.available,
            reserved_units: stock.reserved(),
            sold_units: stock.sold,
        })
    }

    /// Units currently reserved by `holder`.
    pub async fn held_by(&self, item_id: &ItemId, holder: &Holder) -> u32 {
        match self.entry(item_id) {
            Some(entry) => entry.lock().await.held_by(holder),
            None => 0,
        }
    }

    /// Moves `qty` units from available to reserved on behalf of `holder`.
    /// All or nothing.
    #[tracing::instrument(skip(self), fields(holder = %holder))]
    pub async fn reserve_stock(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel> {
        if qty == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        let entry = self.require(item_id)?;
        let mut stock = entry.lock().await;

        if stock.available < qty {
            metrics::counter!("ledger_reservation_rejections_total").increment(1);
            tracing::debug!(available = stock.available, "Reservation rejected");
            return Err(LedgerError::InsufficientStock {
                item_id: item_id.clone(),
                available: stock.available,
                requested: qty,
            });
        }

        let event = StockEvent::StockReserved {
            holder: holder.clone(),
            qty,
        };
        self.commit(item_id, &mut stock, event).await?;

        metrics::counter!("ledger_reservations_total").increment(1);
        tracing::debug!(available = stock.available, "Stock reserved");
        self.publish(item_id, stock.available);
        Ok(Self::level(item_id, stock.available))
    }

    /// Turns `qty` of the holder's reserved units into a permanent sale.
    ///
    /// Replaying a confirm that already went through is a no-op success: the
    /// holder holds nothing any more but has confirmed at least `qty` units.
    #[tracing::instrument(skip(self), fields(holder = %holder))]
    pub async fn confirm_stock_reduction(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel> {
        if qty == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        let entry = self.require(item_id)?;
        let mut stock = entry.lock().await;
        let holding = stock.holdings.get(holder).copied().unwrap_or_default();

        if holding.held >= qty {
            let event = StockEvent::StockConfirmed {
                holder: holder.clone(),
                qty,
            };
            self.commit(item_id, &mut stock, event).await?;

            tracing::debug!(available = stock.available, "Stock reduction confirmed");
            self.publish(item_id, stock.available);
            return Ok(Self::level(item_id, stock.available));
        }

        if holding.held == 0 && holding.confirmed >= qty {
            tracing::debug!("Confirm replayed");
            return Ok(Self::level(item_id, stock.available));
        }

        Err(LedgerError::ExceedsReservation {
            item_id: item_id.clone(),
            held: holding.held,
            requested: qty,
        })
    }

    /// Returns `qty` of the holder's reserved units to available stock.
    #[tracing::instrument(skip(self), fields(holder = %holder))]
    pub async fn release_stock(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel> {
        if qty == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        let entry = self.require(item_id)?;
        let mut stock = entry.lock().await;
        let held = stock.held_by(holder);

        if held < qty {
            return Err(LedgerError::ExceedsReservation {
                item_id: item_id.clone(),
                held,
                requested: qty,
            });
        }

        let event = StockEvent::StockReleased {
            holder: holder.clone(),
            qty,
        };
        self.commit(item_id, &mut stock, event).await?;

        tracing::debug!(available = stock.available, "Stock released");
        self.publish(item_id, stock.available);
        Ok(Self::level(item_id, stock.available))
    }

    /// Moves up to `max_qty` reserved units from one holder to another.
    /// Available stock is unchanged. Returns the number of units moved.
    #[tracing::instrument(skip(self), fields(from = %from, to = %to))]
    pub async fn transfer_reservation(
        &self,
        item_id: &ItemId,
        from: &Holder,
        to: &Holder,
        max_qty: u32,
    ) -> Result<u32> {
        let entry = self.require(item_id)?;
        let mut stock = entry.lock().await;
        let moved = stock.held_by(from).min(max_qty);

        if moved > 0 {
            let event = StockEvent::ReservationTransferred {
                from: from.clone(),
                to: to.clone(),
                qty: moved,
            };
            self.commit(item_id, &mut stock, event).await?;
            tracing::debug!(moved, "Reservation transferred");
        }
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingPublisher {
        updates: StdMutex<Vec<(ItemId, u32)>>,
    }

    impl StockPublisher for RecordingPublisher {
        fn publish(&self, item_id: &ItemId, available_units: u32) {
            self.updates
                .lock()
                .unwrap()
                .push((item_id.clone(), available_units));
        }
    }

    fn book() -> ItemId {
        ItemId::new("book_1")
    }

    fn cart() -> Holder {
        Holder::Cart(UserId::new("alice"))
    }

    async fn ledger_with(units: u32) -> InventoryLedger {
        let ledger = InventoryLedger::new();
        ledger.register_item(book(), units).await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn unknown_item_reads_as_out_of_stock() {
        let ledger = InventoryLedger::new();
        let level = ledger.check_stock(&book()).await;
        assert!(!level.in_stock);
        assert_eq!(level.available_units, 0);
        assert!(ledger.snapshot(&book()).await.is_none());
    }

    #[tokio::test]
    async fn reserve_then_release_restores_available() {
        let ledger = ledger_with(5).await;

        let level = ledger.reserve_stock(&book(), &cart(), 2).await.unwrap();
        assert_eq!(level.available_units, 3);
        let record = ledger.snapshot(&book()).await.unwrap();
        assert_eq!(record.reserved_units, 2);

        let level = ledger.release_stock(&book(), &cart(), 2).await.unwrap();
        assert_eq!(level.available_units, 5);
        assert_eq!(ledger.snapshot(&book()).await.unwrap().reserved_units, 0);
    }

    #[tokio::test]
    async fn reserve_is_all_or_nothing() {
        let ledger = ledger_with(2).await;

        let err = ledger.reserve_stock(&book(), &cart(), 3).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                item_id: book(),
                available: 2,
                requested: 3
            }
        );
        assert_eq!(ledger.check_stock(&book()).await.available_units, 2);
    }

    #[tokio::test]
    async fn zero_quantity_and_unknown_item_are_rejected() {
        let ledger = ledger_with(2).await;
        assert_eq!(
            ledger.reserve_stock(&book(), &cart(), 0).await,
            Err(LedgerError::InvalidQuantity)
        );
        assert!(matches!(
            ledger
                .reserve_stock(&ItemId::new("nope"), &cart(), 1)
                .await,
            Err(LedgerError::UnknownItem(_))
        ));
    }

    #[tokio::test]
    async fn release_beyond_holding_mutates_nothing() {
        let ledger = ledger_with(5).await;
        ledger.reserve_stock(&book(), &cart(), 1).await.unwrap();

        let err = ledger.release_stock(&book(), &cart(), 2).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::ExceedsReservation {
                item_id: book(),
                held: 1,
                requested: 2
            }
        );

        let record = ledger.snapshot(&book()).await.unwrap();
        assert_eq!(record.available_units, 4);
        assert_eq!(record.reserved_units, 1);
    }

    #[tokio::test]
    async fn holders_cannot_release_each_others_units() {
        let ledger = ledger_with(5).await;
        let order = Holder::Order(AggregateId::new());
        ledger.reserve_stock(&book(), &cart(), 2).await.unwrap();

        assert!(ledger.release_stock(&book(), &order, 1).await.is_err());
        assert_eq!(ledger.held_by(&book(), &cart()).await, 2);
    }

    #[tokio::test]
    async fn confirm_is_idempotent_on_replay() {
        let ledger = ledger_with(5).await;
        let order = Holder::Order(AggregateId::new());
        ledger.reserve_stock(&book(), &order, 2).await.unwrap();

        let first = ledger.confirm_stock_reduction(&book(), &order, 2).await.unwrap();
        let replay = ledger.confirm_stock_reduction(&book(), &order, 2).await.unwrap();
        assert_eq!(first, replay);

        let record = ledger.snapshot(&book()).await.unwrap();
        assert_eq!(record.available_units, 3);
        assert_eq!(record.reserved_units, 0);
        assert_eq!(record.sold_units, 2);

        assert!(matches!(
            ledger.confirm_stock_reduction(&book(), &order, 3).await,
            Err(LedgerError::ExceedsReservation { .. })
        ));
    }

    #[tokio::test]
    async fn transfer_moves_holds_without_touching_available() {
        let ledger = ledger_with(5).await;
        let order = Holder::Order(AggregateId::new());
        ledger.reserve_stock(&book(), &cart(), 2).await.unwrap();

        let moved = ledger
            .transfer_reservation(&book(), &cart(), &order, 5)
            .await
            .unwrap();
        assert_eq!(moved, 2);
        assert_eq!(ledger.held_by(&book(), &cart()).await, 0);
        assert_eq!(ledger.held_by(&book(), &order).await, 2);
        assert_eq!(ledger.check_stock(&book()).await.available_units, 3);
    }

    #[tokio::test]
    async fn register_twice_keeps_existing_stock() {
        let ledger = ledger_with(5).await;
        assert!(!ledger.register_item(book(), 100).await.unwrap());
        assert_eq!(ledger.check_stock(&book()).await.available_units, 5);

        let level = ledger.restock(&book(), 3).await.unwrap();
        assert_eq!(level.available_units, 8);
    }

    #[tokio::test]
    async fn every_stock_change_is_published() {
        let publisher = Arc::new(RecordingPublisher::default());
        let ledger = InventoryLedger::with_publisher(publisher.clone());
        let order = Holder::Order(AggregateId::new());

        ledger.register_item(book(), 5).await.unwrap();
        ledger.reserve_stock(&book(), &cart(), 2).await.unwrap();
        ledger
            .transfer_reservation(&book(), &cart(), &order, 2)
            .await
            .unwrap();
        ledger.confirm_stock_reduction(&book(), &order, 1).await.unwrap();
        ledger.release_stock(&book(), &order, 1).await.unwrap();
        let _ = ledger.reserve_stock(&book(), &cart(), 50).await;

        let updates = publisher.updates.lock().unwrap().clone();
        let values: Vec<u32> = updates.iter().map(|(_, units)| *units).collect();
        assert_eq!(values, vec![5, 3, 3, 4]);
    }
}
