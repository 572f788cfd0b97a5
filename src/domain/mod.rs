// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - catalog: books and members as read by the order engine
// - identity: the caller's member identity
// - order: pricing, line mutation, cancellation and lifecycle
// - cart: staging rows kept before an order exists
//
// Persistence lives behind the traits in `crate::store`.
//
// ============================================================================

pub mod catalog;
pub mod identity;
pub mod order;
pub mod cart;
