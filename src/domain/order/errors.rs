use uuid::Uuid;

use super::value_objects::OrderStatus;
use crate::store::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Insufficient stock for product '{product_name}'. Available: {available}, requested: {requested}")]
    InsufficientStock {
        product_name: String,
        available: i32,
        requested: i32,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Only PENDING orders can be cancelled, this order is {0}")]
    InvalidState(OrderStatus),

    #[error("Order must contain at least one item")]
    EmptyCart,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: Uuid, quantity: i32 },

    #[error("Order reference already taken: {0}")]
    ReferenceCollision(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            OrderError::UserNotFound(_) => "user_not_found",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::AccessDenied(_) => "access_denied",
            OrderError::InvalidState(_) => "invalid_state",
            OrderError::EmptyCart => "empty_cart",
            OrderError::InvalidQuantity { .. } => "invalid_quantity",
            OrderError::ReferenceCollision(_) => "reference_collision",
            OrderError::Store(_) => "store",
        }
    }
}

impl IsTransient for OrderError {
    fn is_transient(&self) -> bool {
        match self {
            OrderError::ReferenceCollision(_) => true,
            OrderError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
