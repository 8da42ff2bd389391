//! Cart service: keeps cart lines and ledger reservations in step.

use chrono::{DateTime, Utc};
use common::{ItemId, Money, UserId};
use event_store::EventStore;
use inventory::{Holder, InventoryLedger, LedgerError};
use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{AddCartItem, Cart, CartError, CartLine, UpdateCartItemQuantity};

/// Read model of a cart handed to the storefront and the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub user_id: UserId,
    pub items: Vec<CartLine>,
    pub total: Money,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartSummary {
    fn of(user_id: &UserId, cart: &Cart) -> Self {
        Self {
            user_id: user_id.clone(),
            items: cart.lines().to_vec(),
            total: cart.total(),
            updated_at: cart.updated_at(),
        }
    }
}

fn stock_error(error: LedgerError) -> DomainError {
    match error {
        LedgerError::InsufficientStock {
            item_id,
            available,
            requested,
        } => CartError::OutOfStock {
            item_id,
            available,
            requested,
        }
        .into(),
        other => DomainError::Stock(other),
    }
}

/// Cart operations. Each one changes the ledger first and the cart second,
/// undoing the ledger change if the cart write fails.
pub struct CartService<S: EventStore> {
    handler: CommandHandler<S, Cart>,
    ledger: InventoryLedger,
}

impl<S: EventStore> CartService<S> {
    pub fn new(store: S, ledger: InventoryLedger) -> Self {
        Self {
            handler: CommandHandler::new(store),
            ledger,
        }
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    /// Reserves the units and adds them to the cart.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id, item_id = %cmd.item_id))]
    pub async fn add_item(&self, cmd: AddCartItem) -> Result<CommandResult<Cart>, DomainError> {
        if cmd.quantity == 0 {
            return Err(CartError::InvalidQuantity(cmd.quantity).into());
        }
        if !cmd.unit_price.is_valid_unit_price() {
            return Err(CartError::InvalidPrice(cmd.unit_price.cents()).into());
        }

        let level = self.ledger.check_stock(&cmd.item_id).await;
        if level.available_units < cmd.quantity {
            return Err(CartError::OutOfStock {
                item_id: cmd.item_id.clone(),
                available: level.available_units,
                requested: cmd.quantity,
            }
            .into());
        }

        let holder = Holder::Cart(cmd.user_id.clone());
        self.ledger
            .reserve_stock(&cmd.item_id, &holder, cmd.quantity)
            .await
            .map_err(stock_error)?;

        let cart_id = cmd.aggregate_id();
        let AddCartItem {
            user_id,
            item_id,
            title,
            unit_price,
            quantity,
        } = cmd;
        let line_item = item_id.clone();

        let result = self
            .handler
            .execute(cart_id, |cart| {
                cart.add_item(&user_id, line_item, title, unit_price, quantity)
            })
            .await;

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Cart write failed, releasing reservation");
            self.compensate_release(&item_id, &holder, quantity).await;
        } else {
            tracing::info!(quantity, "Item added to cart");
        }
        result
    }

    /// Sets a line's quantity, reserving or releasing the difference.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id, item_id = %cmd.item_id))]
    pub async fn update_quantity(
        &self,
        cmd: UpdateCartItemQuantity,
    ) -> Result<CommandResult<Cart>, DomainError> {
        if cmd.quantity == 0 {
            return self.remove_item(&cmd.user_id, &cmd.item_id).await;
        }

        let cart_id = cmd.aggregate_id();
        let cart = self.handler.load(cart_id).await?;
        let current = cart
            .line(&cmd.item_id)
            .ok_or_else(|| CartError::ItemNotInCart(cmd.item_id.clone()))?
            .quantity;
        let holder = Holder::Cart(cmd.user_id.clone());
        let item_id = cmd.item_id.clone();
        let new_quantity = cmd.quantity;

        if new_quantity > current {
            let delta = new_quantity - current;
            self.ledger
                .reserve_stock(&item_id, &holder, delta)
                .await
                .map_err(stock_error)?;

            let result = self
                .handler
                .execute(cart_id, |cart| cart.update_quantity(&item_id, new_quantity))
                .await;
            if result.is_err() {
                self.compensate_release(&item_id, &holder, delta).await;
            }
            return result;
        }

        let released = self
            .release_held(&item_id, &holder, current - new_quantity)
            .await?;
        let result = self
            .handler
            .execute(cart_id, |cart| cart.update_quantity(&item_id, new_quantity))
            .await;
        if result.is_err() {
            self.compensate_reserve(&item_id, &holder, released).await;
        }
        result
    }

    /// Releases what the cart holds for the line and drops the line.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: &UserId,
        item_id: &ItemId,
    ) -> Result<CommandResult<Cart>, DomainError> {
        let cart_id = Cart::id_for(user_id);
        let cart = self.handler.load(cart_id).await?;
        let quantity = cart
            .line(item_id)
            .ok_or_else(|| CartError::ItemNotInCart(item_id.clone()))?
            .quantity;
        let holder = Holder::Cart(user_id.clone());

        let released = self.release_held(item_id, &holder, quantity).await?;
        let result = self
            .handler
            .execute(cart_id, |cart| cart.remove_item(item_id))
            .await;
        if result.is_err() {
            self.compensate_reserve(item_id, &holder, released).await;
        }
        result
    }

    /// Releases every line's reservation and empties the cart. A line whose
    /// release fails is logged and skipped.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: &UserId) -> Result<CommandResult<Cart>, DomainError> {
        let cart_id = Cart::id_for(user_id);
        let cart = self.handler.load(cart_id).await?;
        let holder = Holder::Cart(user_id.clone());

        for line in cart.lines() {
            if let Err(e) = self.release_held(&line.item_id, &holder, line.quantity).await {
                tracing::warn!(item_id = %line.item_id, error = %e, "Failed to release cart line");
            }
        }

        let result = self.handler.execute(cart_id, |cart| cart.clear()).await?;
        tracing::info!(lines = cart.lines().len(), "Cart cleared");
        Ok(result)
    }

    pub async fn get_cart(&self, user_id: &UserId) -> Result<Option<Cart>, DomainError> {
        self.handler.load_existing(Cart::id_for(user_id)).await
    }

    /// Lines and total of a user's cart. A missing cart is empty.
    pub async fn get_cart_items(&self, user_id: &UserId) -> Result<CartSummary, DomainError> {
        let cart = self.handler.load(Cart::id_for(user_id)).await?;
        Ok(CartSummary::of(user_id, &cart))
    }

    /// Releases up to `quantity` units the holder still holds. Units already
    /// taken over by a checkout are not the cart's to release.
    async fn release_held(
        &self,
        item_id: &ItemId,
        holder: &Holder,
        quantity: u32,
    ) -> Result<u32, DomainError> {
        let held = self.ledger.held_by(item_id, holder).await;
        let to_release = held.min(quantity);
        if to_release > 0 {
            self.ledger.release_stock(item_id, holder, to_release).await?;
        }
        Ok(to_release)
    }

    async fn compensate_release(&self, item_id: &ItemId, holder: &Holder, quantity: u32) {
        metrics::counter!("cart_compensations_total").increment(1);
        if let Err(e) = self.ledger.release_stock(item_id, holder, quantity).await {
            tracing::error!(%item_id, error = %e, "Failed to release reservation after cart write failure");
        }
    }

    async fn compensate_reserve(&self, item_id: &ItemId, holder: &Holder, quantity: u32) {
        if quantity == 0 {
            return;
        }
        metrics::counter!("cart_compensations_total").increment(1);
        if let Err(e) = self.ledger.reserve_stock(item_id, holder, quantity).await {
            tracing::error!(%item_id, error = %e, "Failed to restore reservation after cart write failure");
        }
    }
}
