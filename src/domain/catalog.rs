use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Catalog Reference Data
// ============================================================================
//
// Books and members are read by the order engine but never mutated by it.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub list_price: Decimal,
    /// Flat sale discount per order line. `None` means the book is not on sale.
    pub sale_discount: Option<Decimal>,
}

impl Book {
    pub fn new(title: impl Into<String>, list_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            list_price,
            sale_discount: None,
        }
    }

    pub fn with_sale_discount(mut self, discount: Decimal) -> Self {
        self.sale_discount = Some(discount);
        self
    }

    /// Discount snapshot copied onto order lines
    pub fn line_discount(&self) -> Decimal {
        self.sale_discount.unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub membership_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Member {
    pub fn new(
        membership_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            membership_id: membership_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}
