use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Shopping Cart - staging rows before an order exists
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCartItem {
    pub id: Uuid,
    pub member_id: Uuid,
    pub book_id: Uuid,
    pub quantity: i32,
    pub date_added: DateTime<Utc>,
}

impl ShoppingCartItem {
    /// Value of the row at the book's current list price
    pub fn line_total(&self, list_price: Decimal) -> Decimal {
        list_price * Decimal::from(self.quantity)
    }
}

/// A member's staged items. Holds at most one row per book.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub member_id: Uuid,
    pub items: Vec<ShoppingCartItem>,
}

impl ShoppingCart {
    pub fn new(member_id: Uuid) -> Self {
        Self {
            member_id,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_for_book(&self, book_id: Uuid) -> Option<&ShoppingCartItem> {
        self.items.iter().find(|item| item.book_id == book_id)
    }

    /// Stage `quantity` units of a book; repeat adds accumulate on one row.
    ///
    /// Returns `None`, leaving the cart untouched, when the row would pass
    /// `i32::MAX` units.
    pub fn add(&mut self, book_id: Uuid, quantity: i32, now: DateTime<Utc>) -> Option<&ShoppingCartItem> {
        let quantity = quantity.max(1);

        match self.items.iter().position(|item| item.book_id == book_id) {
            Some(index) => {
                let row = &mut self.items[index];
                row.quantity = row.quantity.checked_add(quantity)?;
                Some(&self.items[index])
            }
            None => {
                self.items.push(ShoppingCartItem {
                    id: Uuid::new_v4(),
                    member_id: self.member_id,
                    book_id,
                    quantity,
                    date_added: now,
                });
                self.items.last()
            }
        }
    }

    /// Fold duplicate book rows together, keeping the earliest row.
    ///
    /// Loading rows written before the uniqueness rule existed goes through here.
    pub fn from_rows(member_id: Uuid, mut rows: Vec<ShoppingCartItem>) -> Self {
        rows.sort_by_key(|row| row.date_added);

        let mut cart = Self::new(member_id);
        for row in rows {
            match cart.items.iter_mut().find(|item| item.book_id == row.book_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(row.quantity.max(1)),
                None => cart.items.push(row),
            }
        }
        cart
    }
}
