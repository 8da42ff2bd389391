use common::{AggregateId, ItemId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory::{Holder, InventoryLedger};

fn bench_reserve_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InventoryLedger::new();
    let item = ItemId::new("book_1");
    let holder = Holder::Cart(UserId::new("bench"));
    rt.block_on(ledger.register_item(item.clone(), 1_000)).unwrap();

    c.bench_function("ledger/reserve_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.reserve_stock(&item, &holder, 1).await.unwrap();
                ledger.release_stock(&item, &holder, 1).await.unwrap();
            });
        });
    });
}

fn bench_checkout_takeover(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InventoryLedger::new();
    let item = ItemId::new("book_2");
    let cart = Holder::Cart(UserId::new("bench"));
    rt.block_on(ledger.register_item(item.clone(), 1_000_000)).unwrap();

    c.bench_function("ledger/transfer_and_confirm", |b| {
        b.iter(|| {
            rt.block_on(async {
                let order = Holder::Order(AggregateId::new());
                ledger.reserve_stock(&item, &cart, 2).await.unwrap();
                ledger
                    .transfer_reservation(&item, &cart, &order, 2)
                    .await
                    .unwrap();
                ledger.confirm_stock_reduction(&item, &order, 2).await.unwrap();
            });
        });
    });
}

fn bench_concurrent_reservations(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("ledger/concurrent_reserve_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ledger = InventoryLedger::new();
                let item = ItemId::new("book_3");
                ledger.register_item(item.clone(), 50).await.unwrap();

                let handles: Vec<_> = (0..100)
                    .map(|i| {
                        let ledger = ledger.clone();
                        let item = item.clone();
                        tokio::spawn(async move {
                            let holder = Holder::Cart(UserId::new(format!("user-{i}")));
                            let _ = ledger.reserve_stock(&item, &holder, 1).await;
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_reserve_release,
    bench_checkout_takeover,
    bench_concurrent_reservations
);
criterion_main!(benches);
