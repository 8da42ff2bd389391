//! Cart service against a real ledger and event store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{AggregateId, ItemId, UserId};
use domain::{AddCartItem, CartError, CartService, DomainError, Money, UpdateCartItemQuantity};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, InMemoryEventStore, Version,
};
use inventory::{Holder, InventoryLedger};

/// Event store whose appends can be switched off.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: InMemoryEventStore,
    fail_appends: Arc<AtomicBool>,
}

#[async_trait]
impl EventStore for FlakyStore {
    async fn append(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> event_store::Result<Version> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable("appends disabled".into()));
        }
        self.inner.append(events, options).await
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.get_events_for_aggregate(aggregate_id).await
    }

    async fn get_events_by_type(&self, event_type: &str) -> event_store::Result<Vec<EventEnvelope>> {
        self.inner.get_events_by_type(event_type).await
    }

    async fn get_aggregate_ids(&self, aggregate_type: &str) -> event_store::Result<Vec<AggregateId>> {
        self.inner.get_aggregate_ids(aggregate_type).await
    }

    async fn get_aggregate_version(
        &self,
        aggregate_id: AggregateId,
    ) -> event_store::Result<Option<Version>> {
        self.inner.get_aggregate_version(aggregate_id).await
    }
}

fn alice() -> UserId {
    UserId::new("alice")
}

fn book(id: &str) -> ItemId {
    ItemId::new(id)
}

async fn setup() -> (CartService<FlakyStore>, FlakyStore, InventoryLedger) {
    let ledger = InventoryLedger::new();
    ledger.register_item(book("book_1"), 10).await.unwrap();
    ledger.register_item(book("book_2"), 5).await.unwrap();
    ledger.register_item(book("book_3"), 0).await.unwrap();

    let store = FlakyStore::default();
    (
        CartService::new(store.clone(), ledger.clone()),
        store,
        ledger,
    )
}

fn add(item: &str, qty: u32) -> AddCartItem {
    AddCartItem::new(alice(), item, format!("Title {item}"), Money::from_cents(1000)).with_quantity(qty)
}

mod adding {
    use super::*;

    #[tokio::test]
    async fn add_reserves_under_the_cart_holder() {
        let (service, _, ledger) = setup().await;

        let result = service.add_item(add("book_2", 2)).await.unwrap();

        assert_eq!(result.aggregate.lines().len(), 1);
        assert_eq!(result.aggregate.total().cents(), 2000);
        assert_eq!(ledger.check_stock(&book("book_2")).await.available_units, 3);
        assert_eq!(ledger.held_by(&book("book_2"), &Holder::Cart(alice())).await, 2);
    }

    #[tokio::test]
    async fn out_of_stock_item_is_rejected_without_reserving() {
        let (service, _, ledger) = setup().await;

        let err = service.add_item(add("book_3", 1)).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Cart(CartError::OutOfStock { available: 0, .. })
        ));
        assert!(service.get_cart(&alice()).await.unwrap().is_none());
        assert_eq!(ledger.snapshot(&book("book_3")).await.unwrap().reserved_units, 0);
    }

    #[tokio::test]
    async fn failed_cart_write_releases_the_reservation() {
        let (service, store, ledger) = setup().await;
        store.fail_appends.store(true, Ordering::SeqCst);

        let err = service.add_item(add("book_1", 3)).await.unwrap_err();

        assert!(matches!(err, DomainError::EventStore(_)));
        let record = ledger.snapshot(&book("book_1")).await.unwrap();
        assert_eq!(record.available_units, 10);
        assert_eq!(record.reserved_units, 0);
    }

    #[tokio::test]
    async fn absurd_price_is_rejected_before_reserving() {
        let (service, _, ledger) = setup().await;
        let cmd = AddCartItem::new(alice(), "book_1", "Title", Money::from_cents(i64::MAX))
            .with_quantity(2);

        let err = service.add_item(cmd).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Cart(CartError::InvalidPrice(i64::MAX))
        ));
        assert_eq!(ledger.check_stock(&book("book_1")).await.available_units, 10);

        service.add_item(add("book_2", 1)).await.unwrap();
        let summary = service.get_cart_items(&alice()).await.unwrap();
        assert_eq!(summary.total.cents(), 1000);
    }
}

mod changing {
    use super::*;

    #[tokio::test]
    async fn update_reserves_or_releases_the_difference() {
        let (service, _, ledger) = setup().await;
        service.add_item(add("book_1", 2)).await.unwrap();

        service
            .update_quantity(UpdateCartItemQuantity::new(alice(), "book_1", 5))
            .await
            .unwrap();
        assert_eq!(ledger.check_stock(&book("book_1")).await.available_units, 5);

        let result = service
            .update_quantity(UpdateCartItemQuantity::new(alice(), "book_1", 1))
            .await
            .unwrap();
        assert_eq!(result.aggregate.lines()[0].quantity, 1);
        assert_eq!(ledger.check_stock(&book("book_1")).await.available_units, 9);
    }

    #[tokio::test]
    async fn update_beyond_stock_leaves_quantity_unchanged() {
        let (service, _, ledger) = setup().await;
        service.add_item(add("book_2", 2)).await.unwrap();

        let err = service
            .update_quantity(UpdateCartItemQuantity::new(alice(), "book_2", 9))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Cart(CartError::OutOfStock { .. })));
        let cart = service.get_cart(&alice()).await.unwrap().unwrap();
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(ledger.check_stock(&book("book_2")).await.available_units, 3);
    }

    #[tokio::test]
    async fn update_to_zero_removes_the_line() {
        let (service, _, ledger) = setup().await;
        service.add_item(add("book_2", 2)).await.unwrap();

        let result = service
            .update_quantity(UpdateCartItemQuantity::new(alice(), "book_2", 0))
            .await
            .unwrap();

        assert!(result.aggregate.is_empty());
        assert_eq!(ledger.check_stock(&book("book_2")).await.available_units, 5);
    }

    #[tokio::test]
    async fn unknown_line_is_reported() {
        let (service, _, _) = setup().await;
        let err = service
            .update_quantity(UpdateCartItemQuantity::new(alice(), "book_1", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Cart(CartError::ItemNotInCart(_))));
    }

    #[tokio::test]
    async fn remove_only_releases_what_the_cart_still_holds() {
        let (service, _, ledger) = setup().await;
        service.add_item(add("book_1", 3)).await.unwrap();

        // A checkout took over two of the three units.
        let order = Holder::Order(AggregateId::new());
        ledger
            .transfer_reservation(&book("book_1"), &Holder::Cart(alice()), &order, 2)
            .await
            .unwrap();

        service.remove_item(&alice(), &book("book_1")).await.unwrap();

        let record = ledger.snapshot(&book("book_1")).await.unwrap();
        assert_eq!(record.available_units, 8);
        assert_eq!(record.reserved_units, 2);
    }

    #[tokio::test]
    async fn clear_releases_every_line_and_keeps_the_cart() {
        let (service, _, ledger) = setup().await;
        service.add_item(add("book_1", 2)).await.unwrap();
        service.add_item(add("book_2", 1)).await.unwrap();

        let result = service.clear_cart(&alice()).await.unwrap();

        assert!(result.aggregate.is_empty());
        assert!(service.get_cart(&alice()).await.unwrap().is_some());
        assert_eq!(ledger.check_stock(&book("book_1")).await.available_units, 10);
        assert_eq!(ledger.check_stock(&book("book_2")).await.available_units, 5);
    }
}

#[tokio::test]
async fn summary_of_missing_cart_is_empty() {
    let (service, _, _) = setup().await;
    let summary = service.get_cart_items(&UserId::new("nobody")).await.unwrap();
    assert!(summary.items.is_empty());
    assert_eq!(summary.total, Money::zero());
}
