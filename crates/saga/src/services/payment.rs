//! Payment seam.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, Money};
use payment::{CardDetails, PaymentGate, PaymentOutcome};

use crate::error::SagaError;

/// Payment operations of the inline single-item flow.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Returns the new payment's reference.
    async fn create_payment(
        &self,
        order_id: AggregateId,
        amount: Money,
        description: String,
    ) -> Result<String, SagaError>;

    async fn process_payment(
        &self,
        reference: &str,
        card: &CardDetails,
    ) -> Result<PaymentOutcome, SagaError>;
}

#[async_trait]
impl PaymentService for PaymentGate {
    async fn create_payment(
        &self,
        order_id: AggregateId,
        amount: Money,
        description: String,
    ) -> Result<String, SagaError> {
        let record = PaymentGate::create_payment(self, order_id, amount, description)?;
        Ok(record.reference)
    }

    async fn process_payment(
        &self,
        reference: &str,
        card: &CardDetails,
    ) -> Result<PaymentOutcome, SagaError> {
        Ok(PaymentGate::process_payment(self, reference, card).await?)
    }
}

#[async_trait]
impl<T: PaymentService + ?Sized> PaymentService for Arc<T> {
    async fn create_payment(
        &self,
        order_id: AggregateId,
        amount: Money,
        description: String,
    ) -> Result<String, SagaError> {
        (**self).create_payment(order_id, amount, description).await
    }

    async fn process_payment(
        &self,
        reference: &str,
        card: &CardDetails,
    ) -> Result<PaymentOutcome, SagaError> {
        (**self).process_payment(reference, card).await
    }
}
