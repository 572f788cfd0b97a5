use uuid::Uuid;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    /// Add to the member's pending cart order, creating it if needed
    AddToCart {
        book_id: Uuid,
        quantity: Option<i32>,
    },
    /// Create a new placed order holding a single line
    BuyNow {
        book_id: Uuid,
        quantity: Option<i32>,
    },
    CancelItem {
        order_item_id: Uuid,
    },
    PlaceOrder {
        order_id: Uuid,
    },
}

impl OrderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::AddToCart { .. } => "add_to_cart",
            OrderCommand::BuyNow { .. } => "buy_now",
            OrderCommand::CancelItem { .. } => "cancel_item",
            OrderCommand::PlaceOrder { .. } => "place_order",
        }
    }
}

/// Requested quantities below one count as one.
pub fn effective_quantity(requested: Option<i32>) -> i32 {
    requested.unwrap_or(1).max(1)
}
