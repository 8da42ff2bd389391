use std::sync::Arc;

use common::{AggregateId, ItemId, UserId};
use inventory::{Holder, InventoryLedger, LedgerError, StockNotifier, StockPublisher};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_never_oversell() {
    let ledger = InventoryLedger::new();
    let item = ItemId::new("book_1");
    ledger.register_item(item.clone(), 10).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..25 {
        let ledger = ledger.clone();
        let item = item.clone();
        handles.push(tokio::spawn(async move {
            let holder = Holder::Cart(UserId::new(format!("user-{i}")));
            ledger.reserve_stock(&item, &holder, 1).await
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LedgerError::InsufficientStock { .. }) => rejections += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 10);
    assert_eq!(rejections, 15);

    let record = ledger.snapshot(&item).await.unwrap();
    assert_eq!(record.available_units, 0);
    assert_eq!(record.reserved_units, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_operations_preserve_stock_conservation() {
    let ledger = InventoryLedger::new();
    let item = ItemId::new("book_2");
    ledger.register_item(item.clone(), 20).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let ledger = ledger.clone();
        let item = item.clone();
        handles.push(tokio::spawn(async move {
            let holder = Holder::Order(AggregateId::new());
            if ledger.reserve_stock(&item, &holder, 2).await.is_ok() {
                if i % 2 == 0 {
                    ledger.confirm_stock_reduction(&item, &holder, 2).await.unwrap();
                } else {
                    ledger.release_stock(&item, &holder, 2).await.unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let record = ledger.snapshot(&item).await.unwrap();
    assert_eq!(record.reserved_units, 0);
    assert_eq!(record.available_units + record.sold_units, 20);
}

#[tokio::test]
async fn ledger_changes_reach_notifier_sessions() {
    let notifier = Arc::new(StockNotifier::new(16));
    let mut session = notifier.subscribe();
    let ledger = InventoryLedger::with_publisher(notifier.clone() as Arc<dyn StockPublisher>);
    let item = ItemId::new("book_1");

    ledger.register_item(item.clone(), 5).await.unwrap();
    ledger
        .reserve_stock(&item, &Holder::Cart(UserId::new("alice")), 2)
        .await
        .unwrap();

    assert_eq!(session.receiver.recv().await.unwrap().available_units, 5);
    let update = session.receiver.recv().await.unwrap();
    assert_eq!(update.item_id, item);
    assert_eq!(update.available_units, 3);
}
