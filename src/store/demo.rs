use chrono::Utc;
use rust_decimal::Decimal;

use crate::domain::catalog::{Category, Product};
use crate::domain::order::{Order, OrderDraft, OrderReference, OrderStatus};
use crate::domain::user::{Role, User};

// ============================================================================
// Demo Data
// ============================================================================
//
// Two administrators, one client, a small café menu and one completed order
// with the fixed reference `TEST`. Loaded at startup when
// `store.seed_demo_data` is set.
//
// ============================================================================

pub const HISTORICAL_REFERENCE: &str = "TEST";
pub const HISTORICAL_OWNER_EMAIL: &str = "marin@example.com";
pub const HISTORICAL_PRODUCT: &str = "Burger Maison";

pub fn users() -> Vec<User> {
    vec![
        User::new(HISTORICAL_OWNER_EMAIL, "Marin", "Harel", Role::Admin),
        User::new("sabrina@example.com", "Sabrina", "Eloundou", Role::Admin),
        User::new("client@example.com", "Jean", "Dupont", Role::Client),
    ]
}

pub fn catalog() -> Vec<Product> {
    vec![
        Product::new(
            "Salade César",
            "Romaine, grilled chicken, croutons, parmesan and Caesar dressing.",
            Decimal::new(1250, 2),
            25,
            Category::Entree,
        ),
        Product::new(
            HISTORICAL_PRODUCT,
            "Brioche bun, black angus patty, cheddar, caramelised onions and fries.",
            Decimal::new(1890, 2),
            20,
            Category::Plat,
        ),
        Product::new(
            "Moelleux au Chocolat",
            "Molten dark chocolate cake with a scoop of vanilla ice cream.",
            Decimal::new(800, 2),
            15,
            Category::Dessert,
        ),
        Product::new("Espresso", "Single shot.", Decimal::new(250, 2), 100, Category::Boisson),
    ]
}

/// One unit of `product` bought by `owner`, already completed. Stock is not
/// touched: the sale predates the seeded quantities.
pub fn historical_order(owner: &User, product: &Product) -> Order {
    let mut draft = OrderDraft::new(owner.id, Utc::now());
    draft.add_line(product, 1, product.price);

    let mut order = draft.finalize(OrderReference::new(HISTORICAL_REFERENCE));
    order.force_status(OrderStatus::Completed, order.created_at);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_historical_order_is_completed_with_fixed_reference() {
        let users = users();
        let burger = catalog()
            .into_iter()
            .find(|p| p.name == HISTORICAL_PRODUCT)
            .unwrap();

        let order = historical_order(&users[0], &burger);

        assert_eq!(order.reference.as_str(), HISTORICAL_REFERENCE);
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.total(), dec!(18.90));
        assert_eq!(order.user_id, users[0].id);
    }

    #[test]
    fn test_catalog_is_in_stock() {
        assert!(catalog().iter().all(|p| p.available && p.quantity > 0));
    }
}
