use uuid::Uuid;

use crate::store::StoreError;
use crate::utils::IsTransient;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("You do not have permission to modify this order")]
    PermissionDenied,

    #[error("Order is not eligible for this change (status: {0})")]
    InvalidState(OrderStatus),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Quantity for book {book_id} exceeds the maximum of {max} units", max = i32::MAX)]
    QuantityOverflow { book_id: Uuid },

    #[error("Order {order_id} was modified concurrently, please retry")]
    Conflict { order_id: Uuid },

    #[error(transparent)]
    Store(StoreError),
}

impl OrderError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        OrderError::NotFound { entity, id }
    }

    /// The request may succeed if submitted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::Conflict { .. })
    }

    /// The caller's session no longer maps to a member and should be dropped
    pub fn invalidates_session(&self) -> bool {
        matches!(self, OrderError::Authentication(_))
    }

    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::NotFound { .. } => "not_found",
            OrderError::PermissionDenied => "permission_denied",
            OrderError::InvalidState(_) => "invalid_state",
            OrderError::Authentication(_) => "authentication",
            OrderError::QuantityOverflow { .. } => "quantity_overflow",
            OrderError::Conflict { .. } => "conflict",
            OrderError::Store(_) => "store",
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { order_id, .. } => OrderError::Conflict { order_id },
            StoreError::QuantityOverflow { book_id } => OrderError::QuantityOverflow { book_id },
            other => OrderError::Store(other),
        }
    }
}

impl IsTransient for OrderError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflict_maps_to_retryable_error() {
        let order_id = Uuid::new_v4();
        let err: OrderError = StoreError::Conflict {
            order_id,
            expected: 3,
            actual: Some(4),
        }
        .into();

        assert!(matches!(err, OrderError::Conflict { order_id: id } if id == order_id));
        assert!(err.is_retryable());
        assert!(err.is_transient());
    }

    #[test]
    fn test_store_quantity_overflow_maps_to_domain_error() {
        let book_id = Uuid::new_v4();
        let err: OrderError = StoreError::QuantityOverflow { book_id }.into();

        assert!(matches!(err, OrderError::QuantityOverflow { book_id: id } if id == book_id));
        assert_eq!(err.reason(), "quantity_overflow");
        assert!(err.to_string().contains("2147483647"));
    }

    #[test]
    fn test_domain_errors_are_not_retryable() {
        let errors = [
            OrderError::not_found("Book", Uuid::new_v4()),
            OrderError::PermissionDenied,
            OrderError::InvalidState(OrderStatus::Completed),
            OrderError::Authentication("missing claim".to_string()),
            OrderError::QuantityOverflow { book_id: Uuid::new_v4() },
        ];

        for err in errors {
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_only_authentication_invalidates_session() {
        assert!(OrderError::Authentication("gone".to_string()).invalidates_session());
        assert!(!OrderError::PermissionDenied.invalidates_session());
    }

    #[test]
    fn test_invalid_state_names_status() {
        let err = OrderError::InvalidState(OrderStatus::Shipped);
        assert_eq!(err.to_string(), "Order is not eligible for this change (status: Shipped)");
    }
}
