use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::Book;
use super::errors::OrderError;
use super::value_objects::{round_money, OrderItem, OrderStatus};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Every item change is followed by `reprice`, which is the only place the
// money fields are written. Status changes go through `transition_to`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    /// Optimistic concurrency token; 0 until first persisted
    pub version: i64,

    pub member_id: Uuid,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,

    // Pricing
    pub subtotal: Decimal,
    pub member_discount: Decimal,
    pub total: Decimal,

    pub claim_code: Option<String>,

    // Audit Trail
    pub order_date: DateTime<Utc>,
    pub date_added: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl Order {
    pub fn new(member_id: Uuid, status: OrderStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            version: 0,
            member_id,
            status,
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            member_discount: Decimal::ZERO,
            total: Decimal::ZERO,
            claim_code: None,
            order_date: now,
            date_added: now,
            date_updated: now,
        }
    }

    /// Cart order that collects "add to cart" lines
    pub fn open_cart(member_id: Uuid, now: DateTime<Utc>) -> Self {
        Self::new(member_id, OrderStatus::Pending, now)
    }

    /// Single-purchase order created by "buy now"
    pub fn direct(member_id: Uuid, now: DateTime<Utc>) -> Self {
        Self::new(member_id, OrderStatus::Placed, now)
    }

    pub fn is_new(&self) -> bool {
        self.version == 0
    }

    pub fn item(&self, item_id: Uuid) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Add `quantity` of `book`, merging into an existing line for the same
    /// book. Snapshots are refreshed from the current book either way.
    ///
    /// A merge that would push the line past `i32::MAX` units is rejected
    /// and leaves the order untouched.
    pub fn add_line(&mut self, book: &Book, quantity: i32, now: DateTime<Utc>) -> Result<&OrderItem, OrderError> {
        let quantity = quantity.max(1);

        let index = match self.items.iter().position(|item| item.book_id == book.id) {
            Some(index) => {
                let existing = &mut self.items[index];
                existing.quantity = existing
                    .quantity
                    .checked_add(quantity)
                    .ok_or(OrderError::QuantityOverflow { book_id: book.id })?;
                existing.refresh_snapshot(book);
                index
            }
            None => {
                self.items.push(OrderItem::for_book(self.id, book, quantity));
                self.items.len() - 1
            }
        };

        self.date_updated = now;
        Ok(&self.items[index])
    }

    pub fn ensure_owned_by(&self, member_id: Uuid) -> Result<(), OrderError> {
        if self.member_id != member_id {
            return Err(OrderError::PermissionDenied);
        }
        Ok(())
    }

    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        if !self.status.is_cancellable() {
            return Err(OrderError::InvalidState(self.status));
        }
        Ok(())
    }

    /// Remove one line. The caller reprices afterwards.
    pub fn remove_item(&mut self, item_id: Uuid, now: DateTime<Utc>) -> Result<OrderItem, OrderError> {
        self.ensure_cancellable()?;

        let index = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| OrderError::not_found("Order item", item_id))?;

        self.date_updated = now;
        Ok(self.items.remove(index))
    }

    pub fn transition_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidState(self.status));
        }

        self.status = next;
        self.date_updated = now;
        Ok(())
    }

    /// Recompute subtotal, member discount and total from the current items.
    ///
    /// An order without items is cancelled with every amount zeroed. That
    /// cancellation goes through the transition table like any other.
    pub fn reprice(&mut self, discount_rate: Decimal, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.items.is_empty() {
            self.transition_to(OrderStatus::Cancelled, now)?;
            self.subtotal = Decimal::ZERO;
            self.member_discount = Decimal::ZERO;
            self.total = Decimal::ZERO;
            self.date_updated = now;
            return Ok(());
        }

        self.subtotal = self.items.iter().map(OrderItem::line_total).sum();
        self.member_discount = round_money(self.subtotal * discount_rate);
        self.total = self.subtotal - self.member_discount;
        self.date_updated = now;
        Ok(())
    }

    /// True when the stored amounts agree with the items
    pub fn totals_consistent(&self) -> bool {
        let expected: Decimal = self.items.iter().map(OrderItem::line_total).sum();
        self.subtotal == expected && self.total == self.subtotal - self.member_discount
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
