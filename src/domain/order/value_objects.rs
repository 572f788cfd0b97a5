use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::Book;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Monetary values are kept to cents.
pub const MONEY_SCALE: u32 = 2;

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Currency formatting handed to the presentation layer, e.g. `$1,234.50`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}${grouped}.{cents}")
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub book_id: Uuid,
    pub quantity: i32,
    /// List price of the book when the line was last touched
    pub unit_price: Decimal,
    /// Sale discount of the book when the line was last touched
    pub item_discount: Decimal,
}

impl OrderItem {
    pub fn for_book(order_id: Uuid, book: &Book, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            book_id: book.id,
            quantity,
            unit_price: book.list_price,
            item_discount: book.line_discount(),
        }
    }

    /// `quantity × unit_price − item_discount`
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price - self.item_discount
    }

    pub fn refresh_snapshot(&mut self, book: &Book) {
        self.unit_price = book.list_price;
        self.item_discount = book.line_discount();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Placed,
    Completed,
    Shipped,
    Delivered,
    Cancelled,
}

/// Statuses whose items count towards a member's purchase history.
pub const COMPLETED_STATUSES: [OrderStatus; 3] = [
    OrderStatus::Completed,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
];

/// Statuses in which single items may still be cancelled.
pub const CANCELLABLE_STATUSES: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Placed];

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Placed => "Placed",
            OrderStatus::Completed => "Completed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_completed(&self) -> bool {
        COMPLETED_STATUSES.contains(self)
    }

    pub fn is_cancellable(&self) -> bool {
        CANCELLABLE_STATUSES.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_completed() || *self == OrderStatus::Cancelled
    }

    /// Transitions governed by this engine. Fulfillment moves between the
    /// completed statuses happen elsewhere.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        match (self, next) {
            (Pending, Placed) | (Pending, Cancelled) => true,
            (Placed, Completed) | (Placed, Shipped) | (Placed, Delivered) | (Placed, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Placed" => Ok(OrderStatus::Placed),
            "Completed" => Ok(OrderStatus::Completed),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_line_total_subtracts_flat_discount() {
        let book = Book::new("Emma", dec!(12.50)).with_sale_discount(dec!(3.00));
        let item = OrderItem::for_book(Uuid::new_v4(), &book, 2);

        assert_eq!(item.unit_price, dec!(12.50));
        assert_eq!(item.item_discount, dec!(3.00));
        assert_eq!(item.line_total(), dec!(22.00));
    }

    #[test]
    fn test_refresh_snapshot_tracks_current_book() {
        let mut book = Book::new("Emma", dec!(12.50));
        let mut item = OrderItem::for_book(Uuid::new_v4(), &book, 1);

        book.list_price = dec!(10.00);
        book.sale_discount = Some(dec!(1.00));
        item.refresh_snapshot(&book);

        assert_eq!(item.unit_price, dec!(10.00));
        assert_eq!(item.item_discount, dec!(1.00));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        let statuses = [
            OrderStatus::Pending,
            OrderStatus::Placed,
            OrderStatus::Completed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ];

        for status in statuses {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("Processing".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_sets() {
        assert!(OrderStatus::Shipped.is_completed());
        assert!(!OrderStatus::Placed.is_completed());
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Placed.is_cancellable());
        assert!(!OrderStatus::Completed.is_cancellable());
        assert!(!OrderStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Placed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Placed.can_transition_to(Delivered));
        assert!(Placed.can_transition_to(Cancelled));
        assert!(!Placed.can_transition_to(Pending));

        for terminal in [Completed, Shipped, Delivered, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Cancelled));
            assert!(!terminal.can_transition_to(Placed));
        }
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(dec!(20)), "$20.00");
        assert_eq!(format_currency(dec!(1234.5)), "$1,234.50");
        assert_eq!(format_currency(dec!(1000000)), "$1,000,000.00");
        assert_eq!(format_currency(dec!(-4.255)), "-$4.26");
        assert_eq!(format_currency(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(4.994)), dec!(4.99));
    }
}
