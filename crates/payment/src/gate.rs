//! Payment gate: creates payment records and authorizes each one once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{AggregateId, Money};
use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use crate::authorizer::{Authorization, Authorizer};
use crate::error::{PaymentError, Result};
use crate::idempotency::IdempotencyStore;
use crate::record::{CardDetails, PaymentOutcome, PaymentRecord, PaymentStatus};

#[derive(Debug, Clone)]
pub struct PaymentGateConfig {
    /// How long a terminal outcome answers duplicate process calls.
    pub idempotency_ttl: Duration,
}

impl Default for PaymentGateConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl: Duration::from_secs(86_400),
        }
    }
}

#[derive(Debug)]
struct PendingEntry {
    record: PaymentRecord,
    claimed: bool,
    /// Unclaimed records past this instant are swept.
    expires_at: Instant,
}

/// Front door for card payments.
///
/// PENDING records live in `pending` until their single authorization
/// finishes; the terminal record then moves to the idempotency store.
pub struct PaymentGate {
    books: Books,
    authorizer: Arc<dyn Authorizer>,
    pending_ttl: Duration,
}

/// Pending records and terminal outcomes, shared with the authorization
/// task so it can settle after the caller has gone.
#[derive(Clone)]
struct Books {
    pending: Arc<DashMap<String, PendingEntry>>,
    outcomes: Arc<IdempotencyStore>,
}

impl Books {
    fn settle(&self, record: PaymentRecord, authorization: Authorization) -> PaymentRecord {
        let settled = PaymentRecord {
            status: authorization.status,
            transaction_id: authorization.transaction_id,
            message: Some(authorization.message),
            updated_at: Utc::now(),
            ..record
        };

        // Outcome first so a concurrent caller never sees neither.
        self.outcomes.insert(settled.clone());
        self.pending.remove(&settled.reference);

        metrics::counter!("payments_processed_total", "status" => settled.status.as_str())
            .increment(1);
        match settled.status {
            PaymentStatus::Approved => tracing::info!(
                order_id = %settled.order_id,
                transaction_id = settled.transaction_id.as_deref().unwrap_or_default(),
                "Payment approved"
            ),
            status => tracing::warn!(
                order_id = %settled.order_id,
                %status,
                message = settled.message.as_deref().unwrap_or_default(),
                "Payment not approved"
            ),
        }
        settled
    }
}

impl PaymentGate {
    pub fn new(config: PaymentGateConfig, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            books: Books {
                pending: Arc::new(DashMap::new()),
                outcomes: Arc::new(IdempotencyStore::new(config.idempotency_ttl)),
            },
            authorizer,
            pending_ttl: config.idempotency_ttl,
        }
    }

    /// Creates a fresh PENDING payment.
    #[tracing::instrument(skip_all, fields(%order_id, %amount))]
    pub fn create_payment(
        &self,
        order_id: AggregateId,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<PaymentRecord> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount(amount.cents()));
        }

        let now = Utc::now();
        let record = PaymentRecord {
            reference: format!("REF-{}", Uuid::new_v4().simple()),
            order_id,
            amount,
            description: description.into(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            message: None,
            created_at: now,
            updated_at: now,
        };

        self.books.pending.insert(
            record.reference.clone(),
            PendingEntry {
                record: record.clone(),
                claimed: false,
                expires_at: Instant::now() + self.pending_ttl,
            },
        );
        metrics::counter!("payments_created_total").increment(1);
        tracing::info!(reference = %record.reference, "Payment created");
        Ok(record)
    }

    /// Authorizes a PENDING payment exactly once.
    ///
    /// The authorization runs on its own task. Dropping the returned future
    /// does not cancel it: the outcome is still recorded and later calls see
    /// `InProgress` and then `AlreadyProcessed`.
    #[tracing::instrument(skip(self, card), fields(card = %card.masked_number()))]
    pub async fn process_payment(
        &self,
        reference: &str,
        card: &CardDetails,
    ) -> Result<PaymentOutcome> {
        let pending = &self.books.pending;
        let outcomes = &self.books.outcomes;

        if let Some(done) = outcomes.get(reference) {
            return Err(already_processed(&done));
        }

        let record = {
            let Some(mut entry) = pending.get_mut(reference) else {
                // Finished between the two lookups.
                return Err(match outcomes.get(reference) {
                    Some(done) => already_processed(&done),
                    None => PaymentError::NotFound(reference.to_string()),
                });
            };
            if entry.claimed {
                return Err(PaymentError::InProgress(reference.to_string()));
            }
            if entry.expires_at <= Instant::now() {
                drop(entry);
                pending.remove_if(reference, |_, entry| !entry.claimed);
                return Err(PaymentError::NotFound(reference.to_string()));
            }
            card.validate()?;
            entry.claimed = true;
            entry.record.clone()
        };

        let task = tokio::spawn({
            let books = self.books.clone();
            let authorizer = self.authorizer.clone();
            let record = record.clone();
            let card = card.clone();
            async move {
                let started = std::time::Instant::now();
                let authorization = authorizer.authorize(record.amount, &card).await;
                metrics::histogram!("payment_authorization_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                books.settle(record, authorization)
            }
        });

        let settled = match task.await {
            Ok(settled) => settled,
            Err(e) => {
                tracing::error!(error = %e, "Authorization task failed");
                self.books.settle(
                    record,
                    Authorization {
                        status: PaymentStatus::Error,
                        transaction_id: None,
                        message: "Authorization failed".to_string(),
                    },
                )
            }
        };
        Ok(PaymentOutcome::from(&settled))
    }

    pub fn get_payment(&self, reference: &str) -> Result<PaymentRecord> {
        if let Some(entry) = self.books.pending.get(reference)
            && (entry.claimed || entry.expires_at > Instant::now())
        {
            return Ok(entry.record.clone());
        }
        self.books
            .outcomes
            .get(reference)
            .ok_or_else(|| PaymentError::NotFound(reference.to_string()))
    }

    /// Drops expired terminal outcomes and PENDING payments nobody processed
    /// within the same TTL. Returns how many entries were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let pending = &self.books.pending;
        let before = pending.len();
        pending.retain(|_, entry| entry.claimed || entry.expires_at > now);
        let stale = before.saturating_sub(pending.len());
        if stale > 0 {
            tracing::debug!(stale, "Evicted unprocessed payments");
        }
        stale + self.books.outcomes.evict_expired()
    }
}

fn already_processed(record: &PaymentRecord) -> PaymentError {
    PaymentError::AlreadyProcessed {
        reference: record.reference.clone(),
        status: record.status,
    }
}
