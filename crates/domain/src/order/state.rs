//! Order status machine.

use serde::{Deserialize, Serialize};

/// Status of an order.
///
/// ```text
/// CREATED ──┬──► PAID ──► SHIPPED ──► DELIVERED
///           └──► PAYMENT_FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Persisted by a checkout, awaiting the payment outcome.
    #[default]
    Created,

    Paid,

    PaymentFailed,

    Shipped,

    Delivered,
}

impl OrderStatus {
    pub fn can_record_payment(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Paid => "PAID",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATED" => Ok(OrderStatus::Created),
            "PAID" => Ok(OrderStatus::Paid),
            "PAYMENT_FAILED" => Ok(OrderStatus::PaymentFailed),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_is_recorded_only_on_created_orders() {
        assert!(OrderStatus::Created.can_record_payment());
        assert!(!OrderStatus::Paid.can_record_payment());
        assert!(!OrderStatus::PaymentFailed.can_record_payment());
    }

    #[test]
    fn fulfilment_follows_payment() {
        assert!(OrderStatus::Paid.can_ship());
        assert!(!OrderStatus::Created.can_ship());
        assert!(OrderStatus::Shipped.can_deliver());
        assert!(!OrderStatus::Paid.can_deliver());
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::PaymentFailed).unwrap(),
            "\"PAYMENT_FAILED\""
        );
        assert_eq!("shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert!("LOST".parse::<OrderStatus>().is_err());
    }
}
