use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{demo, OrderQuery, Page, PageRequest, SortDirection, Store, StoreError, StoreTx};
use crate::config::StoreConfig;
use crate::domain::catalog::{Category, Product};
use crate::domain::order::{Order, OrderItem, OrderReference, OrderStatus, ReferenceRegistry};
use crate::domain::user::{Role, User};

// ============================================================================
// Postgres Store
// ============================================================================
//
// Stock reservation takes a row lock (`SELECT ... FOR UPDATE`) on each product
// inside the order transaction, so a concurrent reservation of the same
// product waits for the first one to commit or roll back and then sees the
// decremented quantity. Deadlocks between carts that lock the same products
// in different order surface as `StoreError::Conflict` and are retried by
// the engine.
//
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          UUID PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    role        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id          UUID PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    price       NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
    quantity    INTEGER NOT NULL CHECK (quantity >= 0),
    available   BOOLEAN NOT NULL,
    category    TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS orders (
    id              UUID PRIMARY KEY,
    order_reference TEXT NOT NULL,
    user_id         UUID NOT NULL REFERENCES users (id),
    total           NUMERIC(10, 2) NOT NULL,
    status          TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL,
    updated_at      TIMESTAMPTZ NOT NULL,
    CONSTRAINT orders_order_reference_key UNIQUE (order_reference)
);

CREATE TABLE IF NOT EXISTS order_items (
    id                   UUID PRIMARY KEY,
    order_id             UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    product_id           UUID NOT NULL REFERENCES products (id),
    position             INTEGER NOT NULL,
    quantity             INTEGER NOT NULL CHECK (quantity >= 1),
    price_at_reservation NUMERIC(10, 2) NOT NULL
);

CREATE INDEX IF NOT EXISTS orders_user_created_idx ON orders (user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS orders_status_created_idx ON orders (status, created_at);
CREATE INDEX IF NOT EXISTS order_items_order_idx ON order_items (order_id);
"#;

const REFERENCE_CONSTRAINT: &str = "orders_order_reference_key";

const ORDER_COLUMNS: &str =
    "id, order_reference, user_id, total, status, created_at, updated_at";

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, quantity, available, category";

// ============================================================================
// Error classification
// ============================================================================

/// Map Postgres error codes the engine can recover from onto store errors.
fn classify_database_error(
    code: Option<&str>,
    constraint: Option<&str>,
    message: &str,
) -> Option<StoreError> {
    match code {
        // serialization_failure, deadlock_detected
        Some("40001") | Some("40P01") => Some(StoreError::Conflict(message.to_string())),
        // unique_violation on the reference column
        Some("23505") if constraint == Some(REFERENCE_CONSTRAINT) => {
            Some(StoreError::DuplicateReference(message.to_string()))
        }
        _ => None,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            let code = db.code();
            if let Some(classified) =
                classify_database_error(code.as_deref(), db.constraint(), db.message())
            {
                return classified;
            }
        }
        StoreError::Database(err)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role)
            .map_err(|_| StoreError::Corrupt(format!("unknown role '{}' for user {}", row.role, row.id)))?;

        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    quantity: i32,
    available: bool,
    category: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let category = Category::from_str(&row.category).map_err(|_| {
            StoreError::Corrupt(format!("unknown category '{}' for product {}", row.category, row.id))
        })?;

        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            quantity: row.quantity,
            available: row.available,
            category,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_reference: String,
    user_id: Uuid,
    total: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    price_at_reservation: Decimal,
}

fn parse_status(text: &str) -> Result<OrderStatus, StoreError> {
    OrderStatus::from_str(text).map_err(|_| StoreError::Corrupt(format!("unknown order status '{}'", text)))
}

fn sql_direction(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

/// `WHERE` clause for a listing, with its parameter at `$placeholder`.
fn filter_clause(query: OrderQuery, placeholder: usize) -> String {
    match query {
        OrderQuery::All(_) => String::new(),
        OrderQuery::ByStatus(_) => format!("WHERE status = ${}", placeholder),
        OrderQuery::ByUser(_) => format!("WHERE user_id = ${}", placeholder),
    }
}

fn bind_filter_rows<'q>(
    q: QueryAs<'q, Postgres, OrderRow, PgArguments>,
    query: OrderQuery,
) -> QueryAs<'q, Postgres, OrderRow, PgArguments> {
    match query {
        OrderQuery::All(_) => q,
        OrderQuery::ByStatus(status) => q.bind(status.to_string()),
        OrderQuery::ByUser(user_id) => q.bind(user_id),
    }
}

fn bind_filter_count<'q>(
    q: QueryScalar<'q, Postgres, i64, PgArguments>,
    query: OrderQuery,
) -> QueryScalar<'q, Postgres, i64, PgArguments> {
    match query {
        OrderQuery::All(_) => q,
        OrderQuery::ByStatus(status) => q.bind(status.to_string()),
        OrderQuery::ByUser(user_id) => q.bind(user_id),
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.database_url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to Postgres"
        );

        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    /// Attach items to a batch of order rows, preserving row order.
    async fn load_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name,
                    oi.quantity, oi.price_at_reservation
             FROM order_items oi
             JOIN products p ON p.id = oi.product_id
             WHERE oi.order_id = ANY($1)
             ORDER BY oi.order_id, oi.position",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items_by_order.entry(row.order_id).or_default().push(OrderItem {
                id: row.id,
                product_id: row.product_id,
                product_name: row.product_name,
                quantity: row.quantity,
                price_at_reservation: row.price_at_reservation,
            });
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                Ok(Order::restore(
                    row.id,
                    OrderReference::new(row.order_reference),
                    row.user_id,
                    items,
                    row.total,
                    parse_status(&row.status)?,
                    row.created_at,
                    row.updated_at,
                ))
            })
            .collect()
    }

    /// Insert demo users, a small catalog and one historical order.
    /// Existing rows are left alone.
    pub async fn seed_demo_data(&self) -> Result<(), StoreError> {
        for user in &demo::users() {
            sqlx::query(
                "INSERT INTO users (id, email, first_name, last_name, role)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (email) DO NOTHING",
            )
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role.to_string())
            .execute(&self.pool)
            .await?;
        }

        for product in &demo::catalog() {
            sqlx::query(
                "INSERT INTO products (id, name, description, price, quantity, available, category)
                 SELECT $1, $2, $3, $4, $5, $6, $7
                 WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $2)",
            )
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(product.quantity)
            .bind(product.available)
            .bind(product.category.to_string())
            .execute(&self.pool)
            .await?;
        }

        self.seed_historical_order().await?;

        tracing::info!("Demo data seeded");
        Ok(())
    }

    async fn seed_historical_order(&self) -> Result<(), StoreError> {
        if self.reference_exists(demo::HISTORICAL_REFERENCE).await? {
            return Ok(());
        }

        let owner = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, first_name, last_name, role FROM users WHERE email = $1",
        )
        .bind(demo::HISTORICAL_OWNER_EMAIL)
        .fetch_optional(&self.pool)
        .await?;
        let product = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE name = $1 LIMIT 1"
        ))
        .bind(demo::HISTORICAL_PRODUCT)
        .fetch_optional(&self.pool)
        .await?;

        let (Some(owner), Some(product)) = (owner, product) else {
            return Ok(());
        };
        let order = demo::historical_order(&User::try_from(owner)?, &Product::try_from(product)?);

        let mut tx = self.begin().await?;
        tx.insert_order(&order).await?;
        tx.commit().await
    }
}

#[async_trait]
impl ReferenceRegistry for PgStore {
    async fn reference_exists(&self, code: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_reference = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, first_name, last_name, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_orders(&self, query: OrderQuery, page: &PageRequest) -> Result<Page<Order>, StoreError> {
        let direction = sql_direction(query.direction());

        let rows_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders {} ORDER BY created_at {direction}, id {direction} LIMIT $1 OFFSET $2",
            filter_clause(query, 3),
        );
        let rows = bind_filter_rows(
            sqlx::query_as::<_, OrderRow>(&rows_sql)
                .bind(page.size as i64)
                .bind(page.offset() as i64),
            query,
        )
        .fetch_all(&self.pool)
        .await?;

        let count_sql = format!("SELECT COUNT(*) FROM orders {}", filter_clause(query, 1));
        let total = bind_filter_count(sqlx::query_scalar::<_, i64>(&count_sql), query)
            .fetch_one(&self.pool)
            .await?;

        let orders = self.load_orders(rows).await?;
        Ok(Page::new(orders, page, total.max(0) as u64))
    }

    async fn find_latest_active_order(&self, user_id: Uuid) -> Result<Option<Order>, StoreError> {
        let active: Vec<String> = OrderStatus::ACTIVE.iter().map(ToString::to_string).collect();

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE user_id = $1 AND status = ANY($2)
             ORDER BY created_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_order_status(&self, order: &Order, expected: OrderStatus) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(order.status.to_string())
        .bind(order.updated_at)
        .bind(order.id)
        .bind(expected.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ============================================================================
// Transaction
// ============================================================================

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE products
             SET name = $2, description = $3, price = $4, quantity = $5,
                 available = $6, category = $7, updated_at = now()
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.quantity)
        .bind(product.available)
        .bind(product.category.to_string())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders (id, order_reference, user_id, total, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.id)
        .bind(order.reference.as_str())
        .bind(order.user_id)
        .bind(order.total())
        .bind(order.status.to_string())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, position, quantity, price_at_reservation)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(position as i32)
            .bind(item.quantity)
            .bind(item.price_at_reservation)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Queries against a live database are exercised through the engine tests on
// the shared `Store` port; these cover the adapter's pure helpers.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_failures_and_deadlocks_are_conflicts() {
        assert!(matches!(
            classify_database_error(Some("40001"), None, "could not serialize access"),
            Some(StoreError::Conflict(_))
        ));
        assert!(matches!(
            classify_database_error(Some("40P01"), None, "deadlock detected"),
            Some(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_reference_unique_violation_is_duplicate_reference() {
        assert!(matches!(
            classify_database_error(Some("23505"), Some(REFERENCE_CONSTRAINT), "duplicate key"),
            Some(StoreError::DuplicateReference(_))
        ));
    }

    #[test]
    fn test_other_errors_are_not_classified() {
        assert!(classify_database_error(Some("23505"), Some("users_email_key"), "dup").is_none());
        assert!(classify_database_error(Some("23503"), None, "fk").is_none());
        assert!(classify_database_error(None, None, "io").is_none());
    }

    #[test]
    fn test_filter_clause_placeholders() {
        assert_eq!(filter_clause(OrderQuery::All(SortDirection::Asc), 3), "");
        assert_eq!(
            filter_clause(OrderQuery::ByStatus(OrderStatus::Ready), 3),
            "WHERE status = $3"
        );
        assert_eq!(filter_clause(OrderQuery::ByUser(Uuid::nil()), 1), "WHERE user_id = $1");
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        let row = ProductRow {
            id: Uuid::new_v4(),
            name: "Mystery".to_string(),
            description: String::new(),
            price: Decimal::ONE,
            quantity: 1,
            available: true,
            category: "SOUP".to_string(),
        };

        assert!(matches!(Product::try_from(row), Err(StoreError::Corrupt(_))));
        assert!(matches!(parse_status("SHIPPED"), Err(StoreError::Corrupt(_))));
        assert_eq!(parse_status("READY").unwrap(), OrderStatus::Ready);
    }
}
