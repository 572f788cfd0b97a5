use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::cart::{ShoppingCart, ShoppingCartItem};
use crate::domain::catalog::{Book, Member};
use crate::domain::order::{Order, OrderItem, OrderStatus};
use super::{CartStore, OrderStore, StoreError};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Orders carry a `version` column. `save_order` bumps it with a guarded
// UPDATE inside the same transaction that rewrites the item rows, so a
// concurrent writer either sees the committed state or fails the guard.
//
// ============================================================================

const SCHEMA: &str = include_str!("schema.sql");

const ORDER_COLUMNS: &str = "id, member_id, status, subtotal, member_discount, total, claim_code, \
                             order_date, date_added, date_updated, version";

/// Partial unique index allowing one `Pending` cart order per member
const PENDING_CART_INDEX: &str = "orders_one_pending_per_member";

const CART_COLUMNS: &str = "id, member_id, book_id, quantity, date_added";

const ITEM_COLUMNS: &str = "id, order_id, book_id, quantity, unit_price, item_discount";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config, database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(database_url)
            .await?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Order schema is up to date");
        Ok(())
    }

    pub async fn upsert_book(&self, book: &Book) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO books (id, title, list_price, sale_discount) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE
             SET title = EXCLUDED.title, list_price = EXCLUDED.list_price, sale_discount = EXCLUDED.sale_discount",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(book.list_price)
        .bind(book.sale_discount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_member(&self, member: &Member) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO members (id, membership_id, first_name, last_name, email) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE
             SET membership_id = EXCLUDED.membership_id, first_name = EXCLUDED.first_name,
                 last_name = EXCLUDED.last_name, email = EXCLUDED.email",
        )
        .bind(member.id)
        .bind(&member.membership_id)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1)"
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = item_from_row(row)?;
            items.entry(item.order_id).or_default().push(item);
        }
        Ok(items)
    }

    async fn with_items(&self, rows: Vec<PgRow>) -> Result<Vec<Order>, StoreError> {
        let mut orders = rows.iter().map(order_from_row).collect::<Result<Vec<_>, _>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items = self.load_items(&ids).await?;
        for order in &mut orders {
            order.items = items.remove(&order.id).unwrap_or_default();
        }
        Ok(orders)
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(Order {
        id: row.try_get("id")?,
        version: row.try_get("version")?,
        member_id: row.try_get("member_id")?,
        status,
        items: Vec::new(),
        subtotal: row.try_get("subtotal")?,
        member_discount: row.try_get("member_discount")?,
        total: row.try_get("total")?,
        claim_code: row.try_get("claim_code")?,
        order_date: row.try_get("order_date")?,
        date_added: row.try_get("date_added")?,
        date_updated: row.try_get("date_updated")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    Ok(OrderItem {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        book_id: row.try_get("book_id")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        item_discount: row.try_get("item_discount")?,
    })
}

fn cart_item_from_row(row: &PgRow) -> Result<ShoppingCartItem, StoreError> {
    Ok(ShoppingCartItem {
        id: row.try_get("id")?,
        member_id: row.try_get("member_id")?,
        book_id: row.try_get("book_id")?,
        quantity: row.try_get("quantity")?,
        date_added: row.try_get("date_added")?,
    })
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(self.with_items(rows).await?.into_iter().next())
    }

    async fn find_active_order_for_member(&self, member_id: Uuid) -> Result<Option<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE member_id = $1 AND status = $2
             ORDER BY date_added ASC
             LIMIT 1"
        ))
        .bind(member_id)
        .bind(OrderStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(self.with_items(rows).await?.into_iter().next())
    }

    async fn find_order_item(&self, order_item_id: Uuid) -> Result<Option<OrderItem>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE id = $1"))
            .bind(order_item_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn find_book(&self, book_id: Uuid) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query("SELECT id, title, list_price, sale_discount FROM books WHERE id = $1")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Book {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            list_price: row.try_get("list_price")?,
            sale_discount: row.try_get("sale_discount")?,
        }))
    }

    async fn find_member(&self, member_id: Uuid) -> Result<Option<Member>, StoreError> {
        let row = sqlx::query(
            "SELECT id, membership_id, first_name, last_name, email FROM members WHERE id = $1",
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Member {
            id: row.try_get("id")?,
            membership_id: row.try_get("membership_id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
        }))
    }

    async fn orders_for_member(&self, member_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE member_id = $1 ORDER BY order_date DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        self.with_items(rows).await
    }

    async fn purchased_quantity(&self, member_id: Uuid, statuses: &[OrderStatus]) -> Result<i64, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let row = sqlx::query(
            "SELECT COALESCE(SUM(oi.quantity), 0)::BIGINT AS purchased
             FROM order_items oi
             JOIN orders o ON o.id = oi.order_id
             WHERE o.member_id = $1 AND o.status = ANY($2)",
        )
        .bind(member_id)
        .bind(&statuses)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("purchased")?)
    }

    async fn save_order(&self, order: &Order, expected_version: i64) -> Result<i64, StoreError> {
        let new_version = expected_version + 1;
        let mut tx = self.pool.begin().await?;

        let affected = if expected_version == 0 {
            let inserted = sqlx::query(&format!(
                "INSERT INTO orders ({ORDER_COLUMNS})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                 ON CONFLICT (id) DO NOTHING"
            ))
            .bind(order.id)
            .bind(order.member_id)
            .bind(order.status.as_str())
            .bind(order.subtotal)
            .bind(order.member_discount)
            .bind(order.total)
            .bind(&order.claim_code)
            .bind(order.order_date)
            .bind(order.date_added)
            .bind(order.date_updated)
            .bind(new_version)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(result) => result.rows_affected(),
                Err(sqlx::Error::Database(db)) if db.constraint() == Some(PENDING_CART_INDEX) => {
                    tx.rollback().await?;
                    tracing::warn!(
                        order_id = %order.id,
                        member_id = %order.member_id,
                        "Member already has an open cart order"
                    );
                    return Err(StoreError::Conflict {
                        order_id: order.id,
                        expected: expected_version,
                        actual: None,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            sqlx::query(
                "UPDATE orders
                 SET status = $3, subtotal = $4, member_discount = $5, total = $6,
                     claim_code = $7, date_updated = $8, version = $9
                 WHERE id = $1 AND version = $2",
            )
            .bind(order.id)
            .bind(expected_version)
            .bind(order.status.as_str())
            .bind(order.subtotal)
            .bind(order.member_discount)
            .bind(order.total)
            .bind(&order.claim_code)
            .bind(order.date_updated)
            .bind(new_version)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        };

        if affected == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                .bind(order.id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            tracing::warn!(
                order_id = %order.id,
                expected_version = expected_version,
                actual_version = ?actual,
                "Order version guard failed"
            );

            return Err(StoreError::Conflict {
                order_id: order.id,
                expected: expected_version,
                actual,
            });
        }

        let kept: Vec<Uuid> = order.items.iter().map(|item| item.id).collect();
        let deleted = sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND NOT (id = ANY($2))")
            .bind(order.id)
            .bind(&kept)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for item in &order.items {
            sqlx::query(&format!(
                "INSERT INTO order_items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (id) DO UPDATE
                 SET quantity = EXCLUDED.quantity,
                     unit_price = EXCLUDED.unit_price,
                     item_discount = EXCLUDED.item_discount"
            ))
            .bind(item.id)
            .bind(order.id)
            .bind(item.book_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.item_discount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            order_id = %order.id,
            new_version = new_version,
            item_count = order.items.len(),
            deleted_items = deleted,
            "Saved order"
        );

        Ok(new_version)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn load_cart(&self, member_id: Uuid) -> Result<ShoppingCart, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM shopping_cart_items WHERE member_id = $1"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(cart_item_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(ShoppingCart::from_rows(member_id, items))
    }

    async fn find_cart_item(&self, cart_item_id: Uuid) -> Result<Option<ShoppingCartItem>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CART_COLUMNS} FROM shopping_cart_items WHERE id = $1"))
            .bind(cart_item_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(cart_item_from_row).transpose()
    }

    async fn stage_cart_item(
        &self,
        member_id: Uuid,
        book_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<ShoppingCartItem, StoreError> {
        // The guarded DO UPDATE skips the row instead of overflowing INTEGER
        let row = sqlx::query(&format!(
            "INSERT INTO shopping_cart_items ({CART_COLUMNS}) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (member_id, book_id) DO UPDATE
             SET quantity = shopping_cart_items.quantity + EXCLUDED.quantity
             WHERE shopping_cart_items.quantity <= 2147483647 - EXCLUDED.quantity
             RETURNING {CART_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(member_id)
        .bind(book_id)
        .bind(quantity.max(1))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => cart_item_from_row(&row),
            None => Err(StoreError::QuantityOverflow { book_id }),
        }
    }

    async fn remove_cart_item(&self, member_id: Uuid, cart_item_id: Uuid) -> Result<bool, StoreError> {
        let deleted = sqlx::query("DELETE FROM shopping_cart_items WHERE id = $1 AND member_id = $2")
            .bind(cart_item_id)
            .bind(member_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}
