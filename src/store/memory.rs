use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::cart::{ShoppingCart, ShoppingCartItem};
use crate::domain::catalog::{Book, Member};
use crate::domain::order::{Order, OrderItem, OrderStatus};
use super::{CartStore, OrderStore, StoreError};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Single lock over all tables, so every save is atomic with respect to
// every read. Used for local runs without a database and as the test double.
//
// ============================================================================

#[derive(Default)]
struct Tables {
    books: HashMap<Uuid, Book>,
    members: HashMap<Uuid, Member>,
    orders: HashMap<Uuid, Order>,
    /// order_item_id -> order_id
    item_index: HashMap<Uuid, Uuid>,
    cart_items: HashMap<Uuid, ShoppingCartItem>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_book(&self, book: Book) {
        self.tables.write().await.books.insert(book.id, book);
    }

    pub async fn put_member(&self, member: Member) {
        self.tables.write().await.members.insert(member.id, member);
    }

    /// Store an order as-is, bypassing the version check. Seeds history
    /// such as already completed orders.
    pub async fn insert_order(&self, mut order: Order) -> Order {
        let mut tables = self.tables.write().await;
        if order.version == 0 {
            order.version = 1;
        }
        for item in &order.items {
            tables.item_index.insert(item.id, order.id);
        }
        tables.orders.insert(order.id, order.clone());
        order
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn find_active_order_for_member(&self, member_id: Uuid) -> Result<Option<Order>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.member_id == member_id && o.status == OrderStatus::Pending)
            .min_by_key(|o| o.date_added)
            .cloned())
    }

    async fn find_order_item(&self, order_item_id: Uuid) -> Result<Option<OrderItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .item_index
            .get(&order_item_id)
            .and_then(|order_id| tables.orders.get(order_id))
            .and_then(|order| order.item(order_item_id))
            .cloned())
    }

    async fn find_book(&self, book_id: Uuid) -> Result<Option<Book>, StoreError> {
        Ok(self.tables.read().await.books.get(&book_id).cloned())
    }

    async fn find_member(&self, member_id: Uuid) -> Result<Option<Member>, StoreError> {
        Ok(self.tables.read().await.members.get(&member_id).cloned())
    }

    async fn orders_for_member(&self, member_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.member_id == member_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn purchased_quantity(&self, member_id: Uuid, statuses: &[OrderStatus]) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.member_id == member_id && statuses.contains(&o.status))
            .flat_map(|o| o.items.iter())
            .map(|item| i64::from(item.quantity))
            .sum())
    }

    async fn save_order(&self, order: &Order, expected_version: i64) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;

        let actual = tables.orders.get(&order.id).map(|stored| stored.version);
        if actual.unwrap_or(0) != expected_version {
            return Err(StoreError::Conflict {
                order_id: order.id,
                expected: expected_version,
                actual,
            });
        }

        // One open cart per member, mirroring the partial unique index
        let second_cart = order.status == OrderStatus::Pending
            && tables
                .orders
                .values()
                .any(|o| o.id != order.id && o.member_id == order.member_id && o.status == OrderStatus::Pending);
        if second_cart {
            return Err(StoreError::Conflict {
                order_id: order.id,
                expected: expected_version,
                actual,
            });
        }

        if let Some(previous) = tables.orders.get(&order.id) {
            let removed: Vec<Uuid> = previous
                .items
                .iter()
                .filter(|old| order.item(old.id).is_none())
                .map(|old| old.id)
                .collect();
            for item_id in removed {
                tables.item_index.remove(&item_id);
            }
        }

        let mut stored = order.clone();
        stored.version = expected_version + 1;
        for item in &stored.items {
            tables.item_index.insert(item.id, stored.id);
        }
        tables.orders.insert(stored.id, stored);

        Ok(expected_version + 1)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn load_cart(&self, member_id: Uuid) -> Result<ShoppingCart, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .cart_items
            .values()
            .filter(|item| item.member_id == member_id)
            .cloned()
            .collect();
        Ok(ShoppingCart::from_rows(member_id, rows))
    }

    async fn find_cart_item(&self, cart_item_id: Uuid) -> Result<Option<ShoppingCartItem>, StoreError> {
        Ok(self.tables.read().await.cart_items.get(&cart_item_id).cloned())
    }

    async fn stage_cart_item(
        &self,
        member_id: Uuid,
        book_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<ShoppingCartItem, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .cart_items
            .values()
            .filter(|item| item.member_id == member_id)
            .cloned()
            .collect();

        let mut cart = ShoppingCart::from_rows(member_id, rows);
        let row = cart
            .add(book_id, quantity, now)
            .cloned()
            .ok_or(StoreError::QuantityOverflow { book_id })?;

        tables.cart_items.insert(row.id, row.clone());
        Ok(row)
    }

    async fn remove_cart_item(&self, member_id: Uuid, cart_item_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.cart_items.get(&cart_item_id) {
            Some(item) if item.member_id == member_id => {
                tables.cart_items.remove(&cart_item_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
