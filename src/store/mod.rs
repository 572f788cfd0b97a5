// ============================================================================
// Store - Persistence Collaborator
// ============================================================================
//
// The engine loads state, mutates it in memory and hands the result back in
// a single `save_*` call. Absence is reported as `Ok(None)`, never as an
// error. `save_order` is atomic and guarded by the order's version.
//
// ============================================================================

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::cart::{ShoppingCart, ShoppingCartItem};
use crate::domain::catalog::{Book, Member};
use crate::domain::order::{Order, OrderItem, OrderStatus};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Concurrency conflict on order {order_id}: expected version {expected}, found {actual:?}")]
    Conflict {
        order_id: Uuid,
        expected: i64,
        actual: Option<i64>,
    },

    #[error("Staged quantity for book {book_id} would overflow")]
    QuantityOverflow { book_id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError>;

    /// The member's `Pending` cart order, if any
    async fn find_active_order_for_member(&self, member_id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn find_order_item(&self, order_item_id: Uuid) -> Result<Option<OrderItem>, StoreError>;

    async fn find_book(&self, book_id: Uuid) -> Result<Option<Book>, StoreError>;

    async fn find_member(&self, member_id: Uuid) -> Result<Option<Member>, StoreError>;

    /// All orders of a member, newest first
    async fn orders_for_member(&self, member_id: Uuid) -> Result<Vec<Order>, StoreError>;

    /// Units bought by the member across orders in one of `statuses`
    async fn purchased_quantity(&self, member_id: Uuid, statuses: &[OrderStatus]) -> Result<i64, StoreError>;

    /// Persist the order row and its complete item set in one transaction.
    ///
    /// Items no longer present on `order` are deleted. Succeeds only when the
    /// stored version equals `expected_version` (0 for a new order) and
    /// returns the new version.
    async fn save_order(&self, order: &Order, expected_version: i64) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn load_cart(&self, member_id: Uuid) -> Result<ShoppingCart, StoreError>;

    async fn find_cart_item(&self, cart_item_id: Uuid) -> Result<Option<ShoppingCartItem>, StoreError>;

    /// Add `quantity` units of a book to the member's row for it, inserting
    /// the row on first use. The read and the write are one atomic step.
    async fn stage_cart_item(
        &self,
        member_id: Uuid,
        book_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<ShoppingCartItem, StoreError>;

    /// Delete one of the member's rows. `false` when no such row exists.
    async fn remove_cart_item(&self, member_id: Uuid, cart_item_id: Uuid) -> Result<bool, StoreError>;
}
