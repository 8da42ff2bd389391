//! Cart aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, ItemId, Money, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{CartError, CartEvent, events::ItemAddedData};

/// One line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl CartLine {
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A user's cart. There is exactly one per user, keyed by a stable ID
/// derived from the user ID.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,

    /// Lines in the order they were first added.
    lines: Vec<CartLine>,

    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            CartEvent::CartOpened(data) => {
                self.id = Some(data.cart_id);
                self.user_id = Some(data.user_id);
                self.updated_at = Some(data.opened_at);
            }
            CartEvent::ItemAdded(data) => self.apply_item_added(data),
            CartEvent::ItemQuantityUpdated(data) => {
                if let Some(line) = self.line_mut(&data.item_id) {
                    line.quantity = data.new_quantity;
                }
                self.updated_at = Some(data.updated_at);
            }
            CartEvent::ItemRemoved(data) => {
                self.lines.retain(|l| l.item_id != data.item_id);
                self.updated_at = Some(data.removed_at);
            }
            CartEvent::CartCleared(data) => {
                self.lines.clear();
                self.updated_at = Some(data.cleared_at);
            }
        }
    }
}

impl Cart {
    /// Stable aggregate ID of a user's cart.
    pub fn id_for(user_id: &UserId) -> AggregateId {
        AggregateId::from_natural_key("cart", user_id.as_str())
    }

    fn line_mut(&mut self, item_id: &ItemId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| &l.item_id == item_id)
    }

    fn apply_item_added(&mut self, data: ItemAddedData) {
        if let Some(line) = self.line_mut(&data.item_id) {
            line.quantity += data.quantity;
        } else {
            self.lines.push(CartLine {
                item_id: data.item_id,
                title: data.title,
                unit_price: data.unit_price,
                quantity: data.quantity,
            });
        }
        self.updated_at = Some(data.added_at);
    }
}

// Query methods
impl Cart {
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, item_id: &ItemId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.item_id == item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::total_price).sum()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

// Command methods (return events)
impl Cart {
    /// Adds units of an item, opening the cart on first use.
    pub fn add_item(
        &self,
        user_id: &UserId,
        item_id: ItemId,
        title: String,
        unit_price: Money,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        if !unit_price.is_valid_unit_price() {
            return Err(CartError::InvalidPrice(unit_price.cents()));
        }

        let mut events = Vec::with_capacity(2);
        if self.id.is_none() {
            events.push(CartEvent::cart_opened(Cart::id_for(user_id), user_id.clone()));
        }
        events.push(CartEvent::item_added(item_id, title, unit_price, quantity));
        Ok(events)
    }

    pub fn update_quantity(
        &self,
        item_id: &ItemId,
        new_quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        let line = self
            .line(item_id)
            .ok_or_else(|| CartError::ItemNotInCart(item_id.clone()))?;

        if new_quantity == 0 {
            return Err(CartError::InvalidQuantity(new_quantity));
        }
        if line.quantity == new_quantity {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::item_quantity_updated(
            item_id.clone(),
            line.quantity,
            new_quantity,
        )])
    }

    pub fn remove_item(&self, item_id: &ItemId) -> Result<Vec<CartEvent>, CartError> {
        if self.line(item_id).is_none() {
            return Err(CartError::ItemNotInCart(item_id.clone()));
        }
        Ok(vec![CartEvent::item_removed(item_id.clone())])
    }

    /// Clearing an empty or missing cart produces no events.
    pub fn clear(&self) -> Result<Vec<CartEvent>, CartError> {
        if self.lines.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::cart_cleared()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn cart_with(lines: &[(&str, u32, i64)]) -> Cart {
        let mut cart = Cart::default();
        for (item, qty, price) in lines {
            let events = cart
                .add_item(
                    &alice(),
                    ItemId::new(*item),
                    format!("Title of {item}"),
                    Money::from_cents(*price),
                    *qty,
                )
                .unwrap();
            cart.apply_events(events);
        }
        cart
    }

    #[test]
    fn first_add_opens_the_cart() {
        let cart = Cart::default();
        let events = cart
            .add_item(&alice(), ItemId::new("book_1"), "Dune".into(), Money::from_cents(1000), 2)
            .unwrap();

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CartEvent::CartOpened(_)));

        let cart = cart_with(&[("book_1", 2, 1000)]);
        assert_eq!(cart.id(), Some(Cart::id_for(&alice())));
        assert_eq!(cart.user_id(), Some(&alice()));
    }

    #[test]
    fn adding_an_existing_item_merges_quantity() {
        let cart = cart_with(&[("book_1", 2, 1000), ("book_2", 1, 500), ("book_1", 1, 1000)]);

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].item_id, ItemId::new("book_1"));
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.total().cents(), 3500);
    }

    #[test]
    fn zero_quantity_and_negative_price_are_rejected() {
        let cart = Cart::default();
        assert_eq!(
            cart.add_item(&alice(), ItemId::new("b"), "B".into(), Money::from_cents(100), 0)
                .unwrap_err(),
            CartError::InvalidQuantity(0)
        );
        assert_eq!(
            cart.add_item(&alice(), ItemId::new("b"), "B".into(), Money::from_cents(-1), 1)
                .unwrap_err(),
            CartError::InvalidPrice(-1)
        );
        assert_eq!(
            cart.add_item(&alice(), ItemId::new("b"), "B".into(), Money::from_cents(i64::MAX), 2)
                .unwrap_err(),
            CartError::InvalidPrice(i64::MAX)
        );
    }

    #[test]
    fn update_and_remove_require_the_line() {
        let mut cart = cart_with(&[("book_1", 2, 1000)]);
        let missing = ItemId::new("book_9");

        assert_eq!(
            cart.update_quantity(&missing, 3).unwrap_err(),
            CartError::ItemNotInCart(missing.clone())
        );
        assert!(cart.remove_item(&missing).is_err());

        assert!(cart.update_quantity(&ItemId::new("book_1"), 2).unwrap().is_empty());

        let events = cart.update_quantity(&ItemId::new("book_1"), 5).unwrap();
        cart.apply_events(events);
        assert_eq!(cart.lines()[0].quantity, 5);

        let events = cart.remove_item(&ItemId::new("book_1")).unwrap();
        cart.apply_events(events);
        assert!(cart.is_empty());
    }

    #[test]
    fn clear_keeps_the_cart_but_empties_it() {
        let mut cart = cart_with(&[("book_1", 2, 1000), ("book_2", 1, 500)]);
        let events = cart.clear().unwrap();
        cart.apply_events(events);

        assert!(cart.is_empty());
        assert!(cart.id().is_some());
        assert!(cart.clear().unwrap().is_empty());
    }
}
