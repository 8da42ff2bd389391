//! Cart seam.

use std::sync::Arc;

use async_trait::async_trait;
use common::UserId;
use domain::CartSummary;
use event_store::EventStore;

use crate::error::SagaError;

/// What the checkout needs from the cart.
#[async_trait]
pub trait CartService: Send + Sync {
    async fn get_cart_items(&self, user_id: &UserId) -> Result<CartSummary, SagaError>;

    async fn clear_cart(&self, user_id: &UserId) -> Result<(), SagaError>;
}

#[async_trait]
impl<S: EventStore> CartService for domain::CartService<S> {
    async fn get_cart_items(&self, user_id: &UserId) -> Result<CartSummary, SagaError> {
        Ok(domain::CartService::get_cart_items(self, user_id).await?)
    }

    async fn clear_cart(&self, user_id: &UserId) -> Result<(), SagaError> {
        domain::CartService::clear_cart(self, user_id).await?;
        Ok(())
    }
}

#[async_trait]
impl<T: CartService + ?Sized> CartService for Arc<T> {
    async fn get_cart_items(&self, user_id: &UserId) -> Result<CartSummary, SagaError> {
        (**self).get_cart_items(user_id).await
    }

    async fn clear_cart(&self, user_id: &UserId) -> Result<(), SagaError> {
        (**self).clear_cart(user_id).await
    }
}
