use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::aggregate::Order;
use super::value_objects::{format_currency, OrderItem, OrderStatus};

// ============================================================================
// Order Views - plain data for the presentation layer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemView {
    pub order_item_id: Uuid,
    pub book_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub item_discount: Decimal,
    pub line_total: Decimal,
    pub line_total_display: String,
    pub cancellable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub order_id: Uuid,
    pub member_id: Uuid,
    pub status: OrderStatus,
    pub items: Vec<OrderItemView>,
    pub subtotal: Decimal,
    pub member_discount: Decimal,
    pub total: Decimal,
    pub subtotal_display: String,
    pub member_discount_display: String,
    pub total_display: String,
    pub order_date: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl OrderItemView {
    fn from_item(item: &OrderItem, status: OrderStatus) -> Self {
        let line_total = item.line_total();
        Self {
            order_item_id: item.id,
            book_id: item.book_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            item_discount: item.item_discount,
            line_total,
            line_total_display: format_currency(line_total),
            cancellable: status.is_cancellable(),
        }
    }
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            member_id: order.member_id,
            status: order.status,
            items: order
                .items
                .iter()
                .map(|item| OrderItemView::from_item(item, order.status))
                .collect(),
            subtotal: order.subtotal,
            member_discount: order.member_discount,
            total: order.total,
            subtotal_display: format_currency(order.subtotal),
            member_discount_display: format_currency(order.member_discount),
            total_display: format_currency(order.total),
            order_date: order.order_date,
            date_updated: order.date_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Book;
    use rust_decimal_macros::dec;

    #[test]
    fn test_view_formats_totals() {
        let mut order = Order::open_cart(Uuid::new_v4(), Utc::now());
        order.add_line(&Book::new("A", dec!(600.00)), 2, Utc::now()).unwrap();
        order.reprice(dec!(0.05), Utc::now()).unwrap();

        let view = OrderView::from(&order);

        assert_eq!(view.subtotal_display, "$1,200.00");
        assert_eq!(view.member_discount_display, "$60.00");
        assert_eq!(view.total_display, "$1,140.00");
        assert_eq!(view.items.len(), 1);
        assert!(view.items[0].cancellable);
        assert_eq!(view.items[0].line_total_display, "$1,200.00");
    }

    #[test]
    fn test_view_serializes_status_by_name() {
        let order = Order::direct(Uuid::new_v4(), Utc::now());
        let json = serde_json::to_value(OrderView::from(&order)).unwrap();
        assert_eq!(json["status"], "Placed");
    }
}
