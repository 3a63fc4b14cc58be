use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{OrderItem, OrderReference, OrderStatus};
use crate::domain::catalog::Product;
use crate::domain::user::Caller;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Invariants:
// 1. Items are fixed at creation; there is no API to add or remove lines
//    on a built `Order`.
// 2. `total` is computed once from the reservation prices and persisted.
//    It is never recomputed from the catalog afterwards.
// 3. `reference` and `created_at` never change after creation.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub reference: OrderReference,
    pub user_id: Uuid,

    // Contents (fixed at creation)
    items: Vec<OrderItem>,
    total: Decimal,

    // Lifecycle
    pub status: OrderStatus,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Rebuild an order from persisted state. The stored total is taken as is.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        reference: OrderReference,
        user_id: Uuid,
        items: Vec<OrderItem>,
        total: Decimal,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            reference,
            user_id,
            items,
            total,
            status,
            created_at,
            updated_at,
        }
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> impl Iterator<Item = &mut OrderItem> {
        self.items.iter_mut()
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Owners and administrators may read an order, nobody else.
    pub fn ensure_readable_by(&self, caller: &Caller) -> Result<(), OrderError> {
        if caller.is_admin() || self.is_owned_by(caller.user_id) {
            Ok(())
        } else {
            Err(OrderError::AccessDenied(
                "you are not allowed to view this order".to_string(),
            ))
        }
    }

    /// Customer cancellation: owner only, and only while still `Pending`.
    pub fn cancel_by(&mut self, caller_id: Uuid, at: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.is_owned_by(caller_id) {
            return Err(OrderError::AccessDenied(
                "you are not allowed to cancel this order".to_string(),
            ));
        }

        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidState(self.status));
        }

        self.status = OrderStatus::Cancelled;
        self.updated_at = at;
        Ok(())
    }

    /// Administrative override. Any status may move to any other status.
    ///
    /// Returns the previous status.
    pub fn force_status(&mut self, to: OrderStatus, at: DateTime<Utc>) -> OrderStatus {
        let from = self.status;
        self.status = to;
        self.updated_at = at;
        from
    }
}

// ============================================================================
// Order Draft - shell accumulated while reserving stock
// ============================================================================

/// An order under construction.
///
/// Starts as a `Pending` shell with no items and a zero total. Lines are
/// appended as stock is reserved; `finalize` attaches the reference and
/// freezes the contents.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    id: Uuid,
    user_id: Uuid,
    items: Vec<OrderItem>,
    total: Decimal,
    created_at: DateTime<Utc>,
}

impl OrderDraft {
    pub fn new(user_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            items: Vec::new(),
            total: Decimal::ZERO,
            created_at,
        }
    }

    /// Append a reserved line, pricing it at `price_at_reservation`.
    pub fn add_line(&mut self, product: &Product, quantity: i32, price_at_reservation: Decimal) {
        let item = OrderItem {
            id: Uuid::new_v4(),
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            price_at_reservation,
        };

        self.total += item.line_total();
        self.items.push(item);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn finalize(self, reference: OrderReference) -> Order {
        Order {
            id: self.id,
            reference,
            user_id: self.user_id,
            items: self.items,
            total: self.total,
            status: OrderStatus::Pending,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Category;
    use rust_decimal_macros::dec;

    fn product(name: &str, price: Decimal) -> Product {
        Product::new(name, "", price, 10, Category::Boisson)
    }

    fn pending_order(owner: Uuid) -> Order {
        let mut draft = OrderDraft::new(owner, Utc::now());
        draft.add_line(&product("Latte", dec!(4.00)), 1, dec!(4.00));
        draft.finalize(OrderReference::new("AB23"))
    }

    #[test]
    fn test_draft_starts_empty_with_zero_total() {
        let draft = OrderDraft::new(Uuid::new_v4(), Utc::now());
        assert_eq!(draft.item_count(), 0);
        assert_eq!(draft.total(), Decimal::ZERO);
    }

    #[test]
    fn test_draft_accumulates_total_from_reservation_prices() {
        let espresso = product("Espresso", dec!(2.50));
        let muffin = product("Muffin", dec!(3.10));

        let mut draft = OrderDraft::new(Uuid::new_v4(), Utc::now());
        draft.add_line(&espresso, 3, dec!(2.50));
        draft.add_line(&muffin, 2, dec!(3.10));

        assert_eq!(draft.item_count(), 2);
        assert_eq!(draft.total(), dec!(13.70));
    }

    #[test]
    fn test_finalize_produces_pending_order_with_reference() {
        let owner = Uuid::new_v4();
        let created_at = Utc::now();
        let mut draft = OrderDraft::new(owner, created_at);
        draft.add_line(&product("Espresso", dec!(2.50)), 3, dec!(2.50));
        let draft_id = draft.id();

        let order = draft.finalize(OrderReference::new("XJ8K"));

        assert_eq!(order.id, draft_id);
        assert_eq!(order.reference.as_str(), "XJ8K");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.user_id, owner);
        assert_eq!(order.total(), dec!(7.50));
        assert_eq!(order.items().len(), 1);
        assert_eq!(order.items()[0].price_at_reservation, dec!(2.50));
        assert_eq!(order.created_at, created_at);
        assert_eq!(order.updated_at, created_at);
    }

    #[test]
    fn test_total_matches_sum_of_lines() {
        let mut draft = OrderDraft::new(Uuid::new_v4(), Utc::now());
        draft.add_line(&product("Tea", dec!(1.99)), 7, dec!(1.99));
        draft.add_line(&product("Scone", dec!(2.35)), 3, dec!(2.35));
        let order = draft.finalize(OrderReference::new("QQ77"));

        let sum: Decimal = order.items().iter().map(OrderItem::line_total).sum();
        assert_eq!(order.total(), sum);
    }

    #[test]
    fn test_owner_can_cancel_pending_order() {
        let owner = Uuid::new_v4();
        let mut order = pending_order(owner);
        let at = Utc::now();

        order.cancel_by(owner, at).unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.updated_at, at);
    }

    #[test]
    fn test_non_owner_cannot_cancel() {
        let mut order = pending_order(Uuid::new_v4());

        let result = order.cancel_by(Uuid::new_v4(), Utc::now());

        assert!(matches!(result, Err(OrderError::AccessDenied(_))));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_cancel_outside_pending_is_invalid_state() {
        let owner = Uuid::new_v4();

        for status in [OrderStatus::Ready, OrderStatus::Completed, OrderStatus::Cancelled] {
            let mut order = pending_order(owner);
            order.force_status(status, Utc::now());

            let result = order.cancel_by(owner, Utc::now());

            assert!(matches!(result, Err(OrderError::InvalidState(s)) if s == status));
            assert_eq!(order.status, status);
        }
    }

    #[test]
    fn test_force_status_is_unconstrained() {
        let mut order = pending_order(Uuid::new_v4());

        assert_eq!(order.force_status(OrderStatus::Completed, Utc::now()), OrderStatus::Pending);
        assert_eq!(order.force_status(OrderStatus::Pending, Utc::now()), OrderStatus::Completed);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_read_access_rules() {
        let owner = Uuid::new_v4();
        let order = pending_order(owner);

        assert!(order.ensure_readable_by(&Caller::client(owner)).is_ok());
        assert!(order.ensure_readable_by(&Caller::admin(Uuid::new_v4())).is_ok());
        assert!(matches!(
            order.ensure_readable_by(&Caller::client(Uuid::new_v4())),
            Err(OrderError::AccessDenied(_))
        ));
    }
}
