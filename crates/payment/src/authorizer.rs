use async_trait::async_trait;
use common::Money;
use uuid::Uuid;

use crate::record::{CardDetails, PaymentStatus};

/// Card network's answer to an authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// One of `Approved`, `Declined`, `Error`.
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub message: String,
}

/// Opaque capability that charges a card.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, amount: Money, card: &CardDetails) -> Authorization;
}

/// Stand-in for the card network used in development and tests.
///
/// Holder `REJECTED` is declined, holder `ERROR` fails, a number that fails
/// the Luhn check is declined and everything else is approved.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedAuthorizer;

impl SimulatedAuthorizer {
    pub fn new() -> Self {
        Self
    }
}

fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    !digits.is_empty() && sum % 10 == 0
}

#[async_trait]
impl Authorizer for SimulatedAuthorizer {
    async fn authorize(&self, amount: Money, card: &CardDetails) -> Authorization {
        let holder = card.card_holder.trim().to_ascii_uppercase();

        if holder == "ERROR" {
            return Authorization {
                status: PaymentStatus::Error,
                transaction_id: None,
                message: "Card network unavailable".to_string(),
            };
        }
        if holder == "REJECTED" {
            return Authorization {
                status: PaymentStatus::Declined,
                transaction_id: None,
                message: "Declined by issuer".to_string(),
            };
        }
        if !luhn_valid(&card.digits()) {
            return Authorization {
                status: PaymentStatus::Declined,
                transaction_id: None,
                message: "Invalid card number".to_string(),
            };
        }

        Authorization {
            status: PaymentStatus::Approved,
            transaction_id: Some(Uuid::new_v4().to_string()),
            message: format!("Approved {amount}"),
        }
    }
}
