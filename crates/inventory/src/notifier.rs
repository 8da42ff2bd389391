use std::sync::atomic::{AtomicU64, Ordering};

use common::ItemId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Sink for stock changes. The ledger calls this after every mutation;
/// implementations must not block.
pub trait StockPublisher: Send + Sync {
    fn publish(&self, item_id: &ItemId, available_units: u32);
}

/// Message pushed to storefront sessions.
///
/// Serializes as `{"type":"STOCK_UPDATE","item_id":..,"available_units":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "STOCK_UPDATE")]
pub struct StockUpdate {
    pub item_id: ItemId,
    pub available_units: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered session and the channel its updates arrive on.
pub struct Subscription {
    pub id: SessionId,
    pub receiver: mpsc::Receiver<StockUpdate>,
}

/// Registry of connected storefront sessions.
///
/// Every update goes to every session. Delivery is best effort: a session
/// whose buffer is full misses the update, and a session whose receiver has
/// gone away is dropped from the registry.
pub struct StockNotifier {
    sessions: DashMap<SessionId, mpsc::Sender<StockUpdate>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl StockNotifier {
    /// `buffer` is the number of undelivered updates each session may queue.
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        self.sessions.insert(id, tx);
        tracing::debug!(session = %id, "Stock session connected");
        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: SessionId) {
        if self.sessions.remove(&id).is_some() {
            tracing::debug!(session = %id, "Stock session disconnected");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl StockPublisher for StockNotifier {
    fn publish(&self, item_id: &ItemId, available_units: u32) {
        let update = StockUpdate {
            item_id: item_id.clone(),
            available_units,
        };

        let mut closed = Vec::new();
        for session in self.sessions.iter() {
            match session.value().try_send(update.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(session = %session.key(), "Session buffer full, update dropped");
                }
                Err(TrySendError::Closed(_)) => closed.push(*session.key()),
            }
        }

        for id in closed {
            self.unsubscribe(id);
        }

        metrics::counter!("stock_updates_published_total").increment(1);
    }
}
