use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::identity::Caller;
use crate::metrics::Metrics;
use crate::store::OrderStore;
use crate::utils::{retry_on_transient, RetryConfig};

use super::aggregate::Order;
use super::commands::{effective_quantity, OrderCommand};
use super::discount::DiscountResolver;
use super::errors::OrderError;
use super::value_objects::OrderStatus;
use super::view::OrderView;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → load → Aggregate mutation → reprice → Store
//
// Each command runs as one load/mutate/save cycle. When the store's version
// guard rejects the save the whole cycle is re-run from a fresh load, up to
// the configured number of attempts.
//
// ============================================================================

pub struct OrderCommandHandler {
    store: Arc<dyn OrderStore>,
    discounts: DiscountResolver,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl OrderCommandHandler {
    pub fn new(store: Arc<dyn OrderStore>, metrics: Arc<Metrics>, retry: RetryConfig) -> Self {
        Self {
            discounts: DiscountResolver::new(store.clone()),
            store,
            metrics,
            retry,
        }
    }

    pub async fn add_to_cart(&self, caller: &Caller, book_id: Uuid, quantity: Option<i32>) -> Result<Order, OrderError> {
        self.handle(caller, OrderCommand::AddToCart { book_id, quantity }).await
    }

    pub async fn buy_now(&self, caller: &Caller, book_id: Uuid, quantity: Option<i32>) -> Result<Order, OrderError> {
        self.handle(caller, OrderCommand::BuyNow { book_id, quantity }).await
    }

    pub async fn cancel_item(&self, caller: &Caller, order_item_id: Uuid) -> Result<Order, OrderError> {
        self.handle(caller, OrderCommand::CancelItem { order_item_id }).await
    }

    pub async fn place_order(&self, caller: &Caller, order_id: Uuid) -> Result<Order, OrderError> {
        self.handle(caller, OrderCommand::PlaceOrder { order_id }).await
    }

    /// Handle a command and persist the resulting order
    pub async fn handle(&self, caller: &Caller, command: OrderCommand) -> Result<Order, OrderError> {
        let operation = command.name();
        let started = Instant::now();

        let result = match caller.member_id() {
            Ok(member_id) => self.execute_with_retry(member_id, &command).await,
            Err(e) => Err(e),
        };

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(order) => {
                self.metrics.record_operation(operation, elapsed, Ok(()));
                tracing::info!(
                    operation = operation,
                    order_id = %order.id,
                    status = %order.status,
                    subtotal = %order.subtotal,
                    member_discount = %order.member_discount,
                    total = %order.total,
                    "Order updated"
                );
            }
            Err(e) => {
                self.metrics.record_operation(operation, elapsed, Err(e.reason()));
                tracing::warn!(operation = operation, error = %e, "Order command rejected");
            }
        }

        result
    }

    async fn execute_with_retry(&self, member_id: Uuid, command: &OrderCommand) -> Result<Order, OrderError> {
        let operation = command.name();

        retry_on_transient(self.retry.clone(), |attempt| async move {
            if attempt > 1 {
                self.metrics.record_retry_attempt(operation, attempt);
            }

            let result = self.execute(member_id, command).await;
            if matches!(result, Err(OrderError::Conflict { .. })) {
                self.metrics.record_conflict(operation);
            }
            if attempt > 1 {
                self.metrics.record_retry_outcome(operation, result.is_ok());
            }
            result
        })
        .await
        .into_result()
    }

    /// One load → mutate → save cycle
    async fn execute(&self, member_id: Uuid, command: &OrderCommand) -> Result<Order, OrderError> {
        match command {
            OrderCommand::AddToCart { book_id, quantity } => {
                self.add_line(member_id, *book_id, effective_quantity(*quantity), false).await
            }
            OrderCommand::BuyNow { book_id, quantity } => {
                self.add_line(member_id, *book_id, effective_quantity(*quantity), true).await
            }
            OrderCommand::CancelItem { order_item_id } => self.remove_line(member_id, *order_item_id).await,
            OrderCommand::PlaceOrder { order_id } => self.checkout(member_id, *order_id).await,
        }
    }

    async fn add_line(&self, member_id: Uuid, book_id: Uuid, quantity: i32, buy_now: bool) -> Result<Order, OrderError> {
        if self.store.find_member(member_id).await?.is_none() {
            return Err(OrderError::Authentication(format!(
                "member {member_id} has no stored account"
            )));
        }

        let book = self
            .store
            .find_book(book_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Book", book_id))?;

        let now = Utc::now();
        let mut order = if buy_now {
            Order::direct(member_id, now)
        } else {
            match self.store.find_active_order_for_member(member_id).await? {
                Some(order) => order,
                None => {
                    tracing::debug!(member_id = %member_id, "Opening new cart order");
                    Order::open_cart(member_id, now)
                }
            }
        };

        let line_quantity = order.add_line(&book, quantity, now)?.quantity;
        tracing::debug!(
            order_id = %order.id,
            book_id = %book.id,
            added = quantity,
            line_quantity = line_quantity,
            "Added order line"
        );

        self.reprice_and_save(order).await
    }

    async fn remove_line(&self, member_id: Uuid, order_item_id: Uuid) -> Result<Order, OrderError> {
        let not_found = || OrderError::not_found("Order item", order_item_id);

        let item = self.store.find_order_item(order_item_id).await?.ok_or_else(not_found)?;
        let mut order = self.store.find_order(item.order_id).await?.ok_or_else(not_found)?;

        order.ensure_owned_by(member_id)?;

        let previous_status = order.status;
        let removed = order.remove_item(order_item_id, Utc::now())?;
        tracing::debug!(
            order_id = %order.id,
            order_item_id = %removed.id,
            remaining = order.items.len(),
            "Removed order line"
        );

        let order = self.reprice_and_save(order).await?;
        if order.status == OrderStatus::Cancelled {
            self.metrics.record_auto_cancel(previous_status.as_str());
            tracing::info!(order_id = %order.id, "Last item removed, order cancelled");
        }
        Ok(order)
    }

    async fn checkout(&self, member_id: Uuid, order_id: Uuid) -> Result<Order, OrderError> {
        let mut order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))?;

        order.ensure_owned_by(member_id)?;
        if order.status != OrderStatus::Pending {
            return Err(OrderError::InvalidState(order.status));
        }

        order.transition_to(OrderStatus::Placed, Utc::now())?;
        self.reprice_and_save(order).await
    }

    /// Shared tail of every mutation: reprice with the member's current
    /// tier, then save under the version loaded with the order.
    async fn reprice_and_save(&self, mut order: Order) -> Result<Order, OrderError> {
        let rate = self.discounts.rate_for_member(order.member_id).await?;
        order.reprice(rate, Utc::now())?;
        self.metrics.record_discount_rate(&rate.to_string());

        let expected_version = order.version;
        order.version = self.store.save_order(&order, expected_version).await?;
        Ok(order)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn order_details(&self, caller: &Caller, order_id: Uuid) -> Result<OrderView, OrderError> {
        let member_id = caller.member_id()?;
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))?;

        order.ensure_owned_by(member_id)?;
        Ok(OrderView::from(&order))
    }

    pub async fn member_orders(&self, caller: &Caller) -> Result<Vec<OrderView>, OrderError> {
        let member_id = caller.member_id()?;
        let orders = self.store.orders_for_member(member_id).await?;
        Ok(orders.iter().map(OrderView::from).collect())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
