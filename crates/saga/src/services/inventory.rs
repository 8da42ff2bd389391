//! Inventory seam.

use std::sync::Arc;

use async_trait::async_trait;
use common::ItemId;
use inventory::{Holder, InventoryLedger, StockLevel};

use crate::error::SagaError;

/// Stock operations the checkout needs.
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn check_stock(&self, item_id: &ItemId) -> Result<StockLevel, SagaError>;

    async fn held_by(&self, item_id: &ItemId, holder: &Holder) -> Result<u32, SagaError>;

    async fn reserve_stock(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError>;

    async fn confirm_stock_reduction(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError>;

    async fn release_stock(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError>;

    /// Moves up to `max_qty` held units between holders; returns the count.
    async fn transfer_reservation(
        &self,
        item_id: &ItemId,
        from: &Holder,
        to: &Holder,
        max_qty: u32,
    ) -> Result<u32, SagaError>;
}

#[async_trait]
impl InventoryService for InventoryLedger {
    async fn check_stock(&self, item_id: &ItemId) -> Result<StockLevel, SagaError> {
        Ok(InventoryLedger::check_stock(self, item_id).await)
    }

    async fn held_by(&self, item_id: &ItemId, holder: &Holder) -> Result<u32, SagaError> {
        Ok(InventoryLedger::held_by(self, item_id, holder).await)
    }

    async fn reserve_stock(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError> {
        Ok(InventoryLedger::reserve_stock(self, item_id, holder, qty).await?)
    }

    async fn confirm_stock_reduction(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError> {
        Ok(InventoryLedger::confirm_stock_reduction(self, item_id, holder, qty).await?)
    }

    async fn release_stock(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError> {
        Ok(InventoryLedger::release_stock(self, item_id, holder, qty).await?)
    }

    async fn transfer_reservation(
        &self,
        item_id: &ItemId,
        from: &Holder,
        to: &Holder,
        max_qty: u32,
    ) -> Result<u32, SagaError> {
        Ok(InventoryLedger::transfer_reservation(self, item_id, from, to, max_qty).await?)
    }
}

#[async_trait]
impl<T: InventoryService + ?Sized> InventoryService for Arc<T> {
    async fn check_stock(&self, item_id: &ItemId) -> Result<StockLevel, SagaError> {
        (**self).check_stock(item_id).await
    }

    async fn held_by(&self, item_id: &ItemId, holder: &Holder) -> Result<u32, SagaError> {
        (**self).held_by(item_id, holder).await
    }

    async fn reserve_stock(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError> {
        (**self).reserve_stock(item_id, holder, qty).await
    }

    async fn confirm_stock_reduction(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError> {
        (**self).confirm_stock_reduction(item_id, holder, qty).await
    }

    async fn release_stock(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        qty: u32,
    ) -> Result<StockLevel, SagaError> {
        (**self).release_stock(item_id, holder, qty).await
    }

    async fn transfer_reservation(
        &self,
        item_id: &ItemId,
        from: &Holder,
        to: &Holder,
        max_qty: u32,
    ) -> Result<u32, SagaError> {
        (**self).transfer_reservation(item_id, from, to, max_qty).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AggregateId, UserId};
    use inventory::LedgerError;

    #[tokio::test]
    async fn ledger_errors_pass_through() {
        let ledger = InventoryLedger::new();
        let item = ItemId::new("book_1");
        ledger.register_item(item.clone(), 1).await.unwrap();
        let service: Arc<dyn InventoryService> = Arc::new(ledger);
        let order = Holder::Order(AggregateId::new());

        let err = service.reserve_stock(&item, &order, 2).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::Stock(LedgerError::InsufficientStock { available: 1, .. })
        ));

        let cart = Holder::Cart(UserId::new("alice"));
        service.reserve_stock(&item, &cart, 1).await.unwrap();
        assert_eq!(service.transfer_reservation(&item, &cart, &order, 5).await.unwrap(), 1);
        assert_eq!(service.held_by(&item, &order).await.unwrap(), 1);
    }
}
