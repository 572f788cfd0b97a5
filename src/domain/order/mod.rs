// ============================================================================
// Order Domain - Pricing and Lifecycle of Member Orders
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderItem, OrderStatus, money helpers)
// - Commands (AddToCart, BuyNow, CancelItem, PlaceOrder)
// - Errors (OrderError enum)
// - Aggregate (Order with line mutation, state machine and repricing)
// - Discount tiers (DiscountResolver)
// - Views (OrderView for presentation)
// - Command Handler (OrderCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod discount;
pub mod view;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use discount::*;
pub use view::*;
pub use command_handler::*;
