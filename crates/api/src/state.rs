//! Shared application state.

use std::sync::Arc;

use domain::CartService;
use event_store::EventStore;
use inventory::{InventoryLedger, StockNotifier};
use payment::{PaymentGate, SimulatedAuthorizer};
use saga::CheckoutCoordinator;

use crate::config::Config;

/// Event store shared by carts, orders and checkouts.
pub type Store = Arc<dyn EventStore>;

pub type Carts = CartService<Store>;

pub type Coordinator = CheckoutCoordinator<Store, InventoryLedger, Arc<Carts>, Arc<PaymentGate>>;

/// Everything the handlers reach through `State`.
pub struct AppState {
    pub store: Store,
    pub ledger: InventoryLedger,
    pub notifier: Arc<StockNotifier>,
    pub carts: Arc<Carts>,
    pub payments: Arc<PaymentGate>,
    pub coordinator: Coordinator,
}

impl AppState {
    /// Wires the ledger to the notifier and the services to the store.
    /// Payments go through the simulated card network.
    pub fn new(store: Store, config: &Config) -> Arc<Self> {
        let notifier = Arc::new(StockNotifier::new(config.notifier_buffer));
        let ledger = InventoryLedger::with_publisher(notifier.clone()).with_journal(store.clone());
        let carts = Arc::new(CartService::new(store.clone(), ledger.clone()));
        let payments = Arc::new(PaymentGate::new(
            config.payment_config(),
            Arc::new(SimulatedAuthorizer::new()),
        ));
        let coordinator = CheckoutCoordinator::new(
            store.clone(),
            ledger.clone(),
            carts.clone(),
            payments.clone(),
            config.saga_config(),
        );

        Arc::new(Self {
            store,
            ledger,
            notifier,
            carts,
            payments,
            coordinator,
        })
    }

    /// Rebuilds stock from the journal, then registers the configured
    /// starting stock for items the journal does not know.
    pub async fn restore_inventory(
        &self,
        seed: &[(common::ItemId, u32)],
    ) -> Result<usize, inventory::LedgerError> {
        let restored = self.ledger.restore().await?;
        let mut seeded = 0;
        for (item_id, units) in seed {
            if self.ledger.register_item(item_id.clone(), *units).await? {
                seeded += 1;
            }
        }
        tracing::info!(restored, seeded, "Inventory ready");
        Ok(restored + seeded)
    }
}
