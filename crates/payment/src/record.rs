use chrono::{DateTime, Utc};
use common::{AggregateId, Money};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Declined,
    Error,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Approved => "APPROVED",
            PaymentStatus::Declined => "DECLINED",
            PaymentStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment as the gate stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub reference: String,
    pub order_id: AggregateId,
    pub amount: Money,
    pub description: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a process call returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub reference: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub message: Option<String>,
}

impl From<&PaymentRecord> for PaymentOutcome {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            reference: record.reference.clone(),
            status: record.status,
            transaction_id: record.transaction_id.clone(),
            message: record.message.clone(),
        }
    }
}

/// Card data submitted with a process call.
///
/// `Debug` masks the number and hides the CVV.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub card_number: String,
    pub card_holder: String,
    /// `MM/YY`
    pub expiry_date: String,
    pub cvv: String,
}

impl CardDetails {
    /// Last four digits only.
    pub fn masked_number(&self) -> String {
        let digits = self.digits();
        if digits.len() < 4 {
            return "****".to_string();
        }
        format!("****{}", &digits[digits.len() - 4..])
    }

    /// Card number without spaces or dashes.
    pub fn digits(&self) -> String {
        self.card_number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect()
    }

    /// Checks that every field is present and well formed.
    pub fn validate(&self) -> Result<()> {
        if self.card_number.trim().is_empty()
            || self.card_holder.trim().is_empty()
            || self.expiry_date.trim().is_empty()
            || self.cvv.trim().is_empty()
        {
            return Err(PaymentError::InvalidCard(
                "complete card data required".to_string(),
            ));
        }

        let digits = self.digits();
        if !(12..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::InvalidCard("malformed card number".to_string()));
        }

        if !(3..=4).contains(&self.cvv.len()) || !self.cvv.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::InvalidCard("malformed CVV".to_string()));
        }

        let month = self
            .expiry_date
            .split_once('/')
            .and_then(|(mm, yy)| {
                (yy.len() == 2 && yy.chars().all(|c| c.is_ascii_digit())).then_some(mm)
            })
            .and_then(|mm| mm.parse::<u32>().ok());
        if !matches!(month, Some(1..=12)) {
            return Err(PaymentError::InvalidCard(
                "expiry date must be MM/YY".to_string(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("card_number", &self.masked_number())
            .field("card_holder", &self.card_holder)
            .field("expiry_date", &self.expiry_date)
            .finish_non_exhaustive()
    }
}
