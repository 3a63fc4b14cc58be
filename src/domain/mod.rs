// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// - catalog: products and their stock
// - user: accounts, roles and the authenticated caller
// - order: order placement, lifecycle and queries
//
// Nothing in here knows about HTTP. Persistence is reached only through the
// store traits.
//
// ============================================================================

pub mod catalog;
pub mod order;
pub mod user;
