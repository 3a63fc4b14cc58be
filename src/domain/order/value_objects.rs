use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Kitchen-facing lifecycle of an order.
///
/// `Pending -> Ready -> Completed`, and `Pending -> Cancelled` for customers.
/// Administrators may force any transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Statuses an order can be in while the customer is still waiting on it.
    pub const ACTIVE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Ready];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// One requested line of a cart, as submitted by the client.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl CartLine {
    pub fn new(product_id: Uuid, quantity: i32) -> Self {
        Self { product_id, quantity }
    }
}

/// A purchased line. Immutable once the order exists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Display name, read from the catalog. Not part of the historical record.
    pub product_name: String,
    pub quantity: i32,
    pub price_at_reservation: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.price_at_reservation * Decimal::from(self.quantity)
    }
}

/// Short human-typable order code shown to customers and kitchen staff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderReference(String);

impl OrderReference {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
