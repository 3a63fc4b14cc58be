// ============================================================================
// Store Ports - persistence seen from the order engine
// ============================================================================
//
// `Store` covers pool-level reads and status updates. `StoreTx` is one
// all-or-nothing unit of work: product rows read through `lock_product` stay
// locked until `commit` or `rollback`, and nothing written through the
// transaction is visible to other callers before `commit`.
//
// ============================================================================

pub mod demo;
pub mod memory;
pub mod page;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::Product;
use crate::domain::order::{Order, OrderStatus, ReferenceRegistry};
use crate::domain::user::User;
use crate::utils::IsTransient;

pub use memory::MemoryStore;
pub use page::{Page, PageRequest, SortDirection};
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Duplicate order reference: {0}")]
    DuplicateReference(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict(_) | StoreError::DuplicateReference(_))
    }
}

/// Which orders to list, and in which order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderQuery {
    /// Every order, by creation time in the given direction.
    All(SortDirection),
    /// Orders in one status, oldest first.
    ByStatus(OrderStatus),
    /// One user's orders, newest first.
    ByUser(Uuid),
}

impl OrderQuery {
    pub fn direction(&self) -> SortDirection {
        match self {
            OrderQuery::All(direction) => *direction,
            OrderQuery::ByStatus(_) => SortDirection::Asc,
            OrderQuery::ByUser(_) => SortDirection::Desc,
        }
    }
}

#[async_trait]
pub trait Store: ReferenceRegistry + Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn find_orders(&self, query: OrderQuery, page: &PageRequest) -> Result<Page<Order>, StoreError>;

    /// Most recent `Pending` or `Ready` order of a user.
    async fn find_latest_active_order(&self, user_id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Persist `order.status` and `order.updated_at` if the stored status is
    /// still `expected`. Returns false when another writer got there first.
    async fn update_order_status(&self, order: &Order, expected: OrderStatus) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StoreTx: Send {
    /// Read a product and hold it against concurrent reservations.
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Insert the order with all of its items.
    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}
