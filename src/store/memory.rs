use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{demo, OrderQuery, Page, PageRequest, SortDirection, Store, StoreError, StoreTx};
use crate::domain::catalog::Product;
use crate::domain::order::{Order, OrderStatus, ReferenceRegistry};
use crate::domain::user::User;

// ============================================================================
// In-Memory Store
// ============================================================================
//
// A transaction owns the whole-store lock for its lifetime, so transactions
// are serializable. Writes are staged on the transaction and only applied to
// the shared state on commit; dropping or rolling back discards them.
//
// ============================================================================

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    references: HashSet<String>,
    insert_conflicts: u32,
    reference_races: u32,
    unreachable: bool,
}

impl MemoryState {
    /// Item names come from the catalog, as a join would provide them.
    fn hydrate(&self, mut order: Order) -> Order {
        for item in order.items_mut() {
            if let Some(product) = self.products.get(&item.product_id) {
                item.product_name = product.name.clone();
            }
        }
        order
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    /// Catalog write path, standing in for admin product management.
    pub async fn upsert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn set_product_price(&self, id: Uuid, price: Decimal) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("no product {}", id)))?;
        product.price = price;
        Ok(())
    }

    /// Insert an order outside of the engine, e.g. historical seed data.
    pub async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.references.insert(order.reference.as_str().to_string()) {
            return Err(StoreError::DuplicateReference(order.reference.to_string()));
        }
        state.orders.insert(order.id, order);
        Ok(())
    }

    /// Load the demo users, catalog and historical order into an empty store.
    pub async fn seed_demo_data(&self) -> Result<(), StoreError> {
        let users = demo::users();
        let catalog = demo::catalog();

        let historical = users
            .iter()
            .find(|u| u.email == demo::HISTORICAL_OWNER_EMAIL)
            .zip(catalog.iter().find(|p| p.name == demo::HISTORICAL_PRODUCT))
            .map(|(owner, product)| demo::historical_order(owner, product));

        for user in users {
            self.insert_user(user).await;
        }
        for product in catalog {
            self.upsert_product(product).await;
        }
        if let Some(order) = historical {
            self.insert_order(order).await?;
        }

        tracing::info!("Demo data seeded");
        Ok(())
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Make the next `n` order inserts fail with a transient conflict.
    #[cfg(test)]
    pub async fn inject_insert_conflicts(&self, n: u32) {
        self.state.lock().await.insert_conflicts = n;
    }

    /// Make the next `n` order inserts find their reference already taken.
    #[cfg(test)]
    pub async fn inject_reference_races(&self, n: u32) {
        self.state.lock().await.reference_races = n;
    }

    /// Make `ping` fail the way a dropped database connection would.
    #[cfg(test)]
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.unreachable = unreachable;
    }
}

#[async_trait]
impl ReferenceRegistry for MemoryStore {
    async fn reference_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.references.contains(code))
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(MemoryTx {
            guard,
            products: HashMap::new(),
            orders: Vec::new(),
        })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&id).cloned().map(|order| state.hydrate(order)))
    }

    async fn find_orders(&self, query: OrderQuery, page: &PageRequest) -> Result<Page<Order>, StoreError> {
        let state = self.state.lock().await;

        let mut matching: Vec<&Order> = state
            .orders
            .values()
            .filter(|order| match query {
                OrderQuery::All(_) => true,
                OrderQuery::ByStatus(status) => order.status == status,
                OrderQuery::ByUser(user_id) => order.user_id == user_id,
            })
            .collect();

        matching.sort_by_key(|order| (order.created_at, order.id));
        if query.direction() == SortDirection::Desc {
            matching.reverse();
        }

        let total = matching.len() as u64;
        let content = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .map(|order| state.hydrate(order.clone()))
            .collect();

        Ok(Page::new(content, page, total))
    }

    async fn find_latest_active_order(&self, user_id: Uuid) -> Result<Option<Order>, StoreError> {
        let state = self.state.lock().await;

        let latest = state
            .orders
            .values()
            .filter(|order| order.user_id == user_id && order.status.is_active())
            .max_by_key(|order| (order.created_at, order.id))
            .cloned();

        Ok(latest.map(|order| state.hydrate(order)))
    }

    async fn update_order_status(&self, order: &Order, expected: OrderStatus) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        match state.orders.get_mut(&order.id) {
            Some(stored) if stored.status == expected => {
                stored.status = order.status;
                stored.updated_at = order.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.state.lock().await.unreachable {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    products: HashMap<Uuid, Product>,
    orders: Vec<Order>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        if let Some(staged) = self.products.get(&id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.guard.products.get(&id).cloned())
    }

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.guard.insert_conflicts > 0 {
            self.guard.insert_conflicts -= 1;
            return Err(StoreError::Conflict("injected insert conflict".to_string()));
        }

        let code = order.reference.as_str();
        if self.guard.reference_races > 0 {
            self.guard.reference_races -= 1;
            return Err(StoreError::DuplicateReference(code.to_string()));
        }

        let staged_dup = self.orders.iter().any(|o| o.reference.as_str() == code);
        if staged_dup || self.guard.references.contains(code) {
            return Err(StoreError::DuplicateReference(code.to_string()));
        }

        self.orders.push(order.clone());
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let MemoryTx {
            mut guard,
            products,
            orders,
        } = self;

        guard.products.extend(products);
        for order in orders {
            guard.references.insert(order.reference.as_str().to_string());
            guard.orders.insert(order.id, order);
        }

        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
