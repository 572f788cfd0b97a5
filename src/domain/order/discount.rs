use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::store::{OrderStore, StoreError};
use super::value_objects::COMPLETED_STATUSES;

// ============================================================================
// Member Loyalty Discount Tiers
// ============================================================================
//
// Tiers are evaluated from the highest threshold down; the first match wins.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscountTier {
    pub min_quantity: i64,
    pub rate: Decimal,
}

pub const DISCOUNT_TIERS: [DiscountTier; 2] = [
    DiscountTier { min_quantity: 10, rate: dec!(0.10) },
    DiscountTier { min_quantity: 5, rate: dec!(0.05) },
];

/// Discount fraction for a member who has bought `purchased` units
pub fn tier_for_quantity(purchased: i64) -> Decimal {
    DISCOUNT_TIERS
        .iter()
        .find(|tier| purchased >= tier.min_quantity)
        .map(|tier| tier.rate)
        .unwrap_or(Decimal::ZERO)
}

/// Resolves a member's discount rate from completed purchase history.
///
/// Read-only and idempotent; every order mutation calls it again.
pub struct DiscountResolver {
    store: Arc<dyn OrderStore>,
}

impl DiscountResolver {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn rate_for_member(&self, member_id: Uuid) -> Result<Decimal, StoreError> {
        let purchased = self
            .store
            .purchased_quantity(member_id, &COMPLETED_STATUSES)
            .await?;
        let rate = tier_for_quantity(purchased);

        tracing::debug!(
            member_id = %member_id,
            purchased = purchased,
            rate = %rate,
            "Resolved member discount tier"
        );

        Ok(rate)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::catalog::{Book, Member};
    use crate::domain::order::{Order, OrderStatus};
    use crate::store::MemoryStore;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier_for_quantity(0), Decimal::ZERO);
        assert_eq!(tier_for_quantity(4), Decimal::ZERO);
        assert_eq!(tier_for_quantity(5), dec!(0.05));
        assert_eq!(tier_for_quantity(9), dec!(0.05));
        assert_eq!(tier_for_quantity(10), dec!(0.10));
        assert_eq!(tier_for_quantity(250), dec!(0.10));
    }

    #[test]
    fn test_negative_history_has_no_discount() {
        assert_eq!(tier_for_quantity(-3), Decimal::ZERO);
    }

    async fn order_with_status(store: &MemoryStore, member: &Member, book: &Book, qty: i32, status: OrderStatus) {
        let mut order = Order::new(member.id, status, Utc::now());
        order.add_line(book, qty, Utc::now()).unwrap();
        order.reprice(Decimal::ZERO, Utc::now()).unwrap();
        store.insert_order(order).await;
    }

    #[tokio::test]
    async fn test_rate_counts_only_completed_orders() {
        let store = Arc::new(MemoryStore::new());
        let member = Member::new("M-1", "Ada", "Lovelace", "ada@example.com");
        let book = Book::new("Notes", dec!(9.99));
        store.put_member(member.clone()).await;
        store.put_book(book.clone()).await;

        order_with_status(&store, &member, &book, 3, OrderStatus::Completed).await;
        order_with_status(&store, &member, &book, 1, OrderStatus::Shipped).await;
        order_with_status(&store, &member, &book, 20, OrderStatus::Pending).await;
        order_with_status(&store, &member, &book, 20, OrderStatus::Cancelled).await;

        let resolver = DiscountResolver::new(store.clone());
        assert_eq!(resolver.rate_for_member(member.id).await.unwrap(), Decimal::ZERO);

        order_with_status(&store, &member, &book, 1, OrderStatus::Delivered).await;
        assert_eq!(resolver.rate_for_member(member.id).await.unwrap(), dec!(0.05));
    }

    #[tokio::test]
    async fn test_rate_ignores_other_members() {
        let store = Arc::new(MemoryStore::new());
        let member = Member::new("M-1", "Ada", "Lovelace", "ada@example.com");
        let other = Member::new("M-2", "Alan", "Turing", "alan@example.com");
        let book = Book::new("Notes", dec!(9.99));

        order_with_status(&store, &other, &book, 12, OrderStatus::Completed).await;

        let resolver = DiscountResolver::new(store.clone());
        assert_eq!(resolver.rate_for_member(member.id).await.unwrap(), Decimal::ZERO);
        assert_eq!(resolver.rate_for_member(other.id).await.unwrap(), dec!(0.10));
    }
}
