// ============================================================================
// Catalog Domain - Products as seen by the order engine
// ============================================================================
//
// Product CRUD lives elsewhere. The engine only reads products and reserves
// stock against them, so this module carries the read model and the
// reservation rule.
//
// ============================================================================

pub mod product;

pub use product::*;
