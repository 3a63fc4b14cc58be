// ============================================================================
// Order Domain - Placement, Lifecycle and Queries
// ============================================================================
//
// - Value objects (CartLine, OrderItem, OrderStatus, OrderReference)
// - Errors (OrderError enum)
// - Aggregate (Order, and OrderDraft while stock is being reserved)
// - Reference generation (4-symbol human-readable codes)
// - Service (OrderService, the transactional engine)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;
pub mod reference;
pub mod service;

pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use reference::*;
pub use service::*;
