//! Value objects for the order domain.

use common::{ItemId, Money};
use serde::{Deserialize, Serialize};

/// A line of an order, copied from the cart when the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn new(
        item_id: impl Into<ItemId>,
        title: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            title: title.into(),
            quantity,
            unit_price,
        }
    }

    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_total() {
        let line = OrderLine::new("book_1", "Dune", 3, Money::from_cents(1250));
        assert_eq!(line.total_price().cents(), 3750);
    }
}
