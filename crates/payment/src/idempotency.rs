//! Time-bounded memory of terminal payment outcomes.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::record::PaymentRecord;

/// Maps a payment reference to its terminal record until the entry's TTL
/// runs out. Expired entries are dropped lazily on lookup and in bulk by
/// [`IdempotencyStore::evict_expired`].
#[derive(Debug)]
pub struct IdempotencyStore {
    entries: DashMap<String, (PaymentRecord, Instant)>,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(&self, record: PaymentRecord) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .insert(record.reference.clone(), (record, expires_at));
    }

    pub fn get(&self, reference: &str) -> Option<PaymentRecord> {
        let now = Instant::now();
        let hit = self.entries.get(reference).map(|entry| {
            let (record, expires_at) = entry.value();
            (record.clone(), *expires_at)
        });

        match hit {
            Some((record, expires_at)) if expires_at > now => Some(record),
            Some(_) => {
                self.entries
                    .remove_if(reference, |_, (_, expires_at)| *expires_at <= now);
                None
            }
            None => None,
        }
    }

    /// Drops every expired entry. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired payment outcomes");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
