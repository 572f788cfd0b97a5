use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::identity::Caller;
use crate::domain::order::{effective_quantity, format_currency, OrderError};
use crate::metrics::Metrics;
use crate::store::{CartStore, OrderStore};

use super::aggregate::ShoppingCart;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartItemView {
    pub cart_item_id: Uuid,
    pub book_id: Uuid,
    pub title: String,
    pub quantity: i32,
    pub list_price: Decimal,
    pub line_total: Decimal,
    pub line_total_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub member_id: Uuid,
    pub items: Vec<CartItemView>,
    pub total: Decimal,
    pub total_display: String,
}

// ============================================================================
// Cart Command Handler
// ============================================================================
//
// Staging rows live outside any order. Book lookups go through the order
// store, rows through the cart store.
//
// ============================================================================

pub struct CartCommandHandler {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn OrderStore>,
    metrics: Arc<Metrics>,
}

impl CartCommandHandler {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn OrderStore>, metrics: Arc<Metrics>) -> Self {
        Self { carts, catalog, metrics }
    }

    /// Stage a book, accumulating onto the member's existing row for it
    pub async fn stage_item(&self, caller: &Caller, book_id: Uuid, quantity: Option<i32>) -> Result<CartView, OrderError> {
        let started = Instant::now();
        let result = self.stage(caller, book_id, effective_quantity(quantity)).await;
        self.finish("stage_item", started, &result);
        result
    }

    pub async fn remove_item(&self, caller: &Caller, cart_item_id: Uuid) -> Result<CartView, OrderError> {
        let started = Instant::now();
        let result = self.unstage(caller, cart_item_id).await;
        self.finish("remove_cart_item", started, &result);
        result
    }

    pub async fn cart_contents(&self, caller: &Caller) -> Result<CartView, OrderError> {
        let member_id = caller.member_id()?;
        let cart = self.carts.load_cart(member_id).await?;
        self.view(&cart).await
    }

    async fn stage(&self, caller: &Caller, book_id: Uuid, quantity: i32) -> Result<CartView, OrderError> {
        let member_id = caller.member_id()?;
        if self.catalog.find_member(member_id).await?.is_none() {
            return Err(OrderError::Authentication(format!(
                "member {member_id} has no stored account"
            )));
        }
        if self.catalog.find_book(book_id).await?.is_none() {
            return Err(OrderError::not_found("Book", book_id));
        }

        let row = self
            .carts
            .stage_cart_item(member_id, book_id, quantity, Utc::now())
            .await?;
        tracing::debug!(member_id = %member_id, book_id = %book_id, quantity = row.quantity, "Staged cart item");

        let cart = self.carts.load_cart(member_id).await?;
        self.view(&cart).await
    }

    async fn unstage(&self, caller: &Caller, cart_item_id: Uuid) -> Result<CartView, OrderError> {
        let member_id = caller.member_id()?;
        let row = self
            .carts
            .find_cart_item(cart_item_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Cart item", cart_item_id))?;

        if row.member_id != member_id {
            return Err(OrderError::PermissionDenied);
        }

        if !self.carts.remove_cart_item(member_id, cart_item_id).await? {
            return Err(OrderError::not_found("Cart item", cart_item_id));
        }

        let cart = self.carts.load_cart(member_id).await?;
        self.view(&cart).await
    }

    async fn view(&self, cart: &ShoppingCart) -> Result<CartView, OrderError> {
        let mut items = Vec::with_capacity(cart.items.len());
        for row in &cart.items {
            let Some(book) = self.catalog.find_book(row.book_id).await? else {
                tracing::warn!(cart_item_id = %row.id, book_id = %row.book_id, "Cart row references missing book");
                continue;
            };

            let line_total = row.line_total(book.list_price);
            items.push(CartItemView {
                cart_item_id: row.id,
                book_id: book.id,
                title: book.title,
                quantity: row.quantity,
                list_price: book.list_price,
                line_total,
                line_total_display: format_currency(line_total),
            });
        }

        let total: Decimal = items.iter().map(|item| item.line_total).sum();
        Ok(CartView {
            member_id: cart.member_id,
            items,
            total,
            total_display: format_currency(total),
        })
    }

    fn finish(&self, operation: &str, started: Instant, result: &Result<CartView, OrderError>) {
        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(_) => self.metrics.record_operation(operation, elapsed, Ok(())),
            Err(e) => {
                self.metrics.record_operation(operation, elapsed, Err(e.reason()));
                tracing::warn!(operation = operation, error = %e, "Cart command rejected");
            }
        }
    }
}
