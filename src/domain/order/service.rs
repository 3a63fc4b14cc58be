use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::aggregate::{Order, OrderDraft};
use super::errors::OrderError;
use super::reference::ReferenceGenerator;
use super::value_objects::{CartLine, OrderReference, OrderStatus};
use crate::domain::user::Caller;
use crate::metrics::Metrics;
use crate::store::{OrderQuery, Page, PageRequest, SortDirection, Store, StoreError, StoreTx};
use crate::utils::{retry_on_transient, RetryPolicy};

// ============================================================================
// Order Service - the order placement engine
// ============================================================================
//
// create_order:  caller → user lookup → reference → BEGIN
//                → per line: lock product, check, decrement, save, snapshot price
//                → insert order + items → COMMIT
//
// Any failure between BEGIN and COMMIT rolls the whole attempt back, so a
// cart either reserves stock for every line or for none. Attempts that fail
// on a transient store conflict are re-run from scratch.
//
// ============================================================================

pub struct OrderService<S: Store> {
    store: Arc<S>,
    references: ReferenceGenerator,
    retry: RetryPolicy,
    metrics: Arc<Metrics>,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: Arc<S>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            references: ReferenceGenerator::new(),
            retry: RetryPolicy::default(),
            metrics,
        }
    }

    pub fn with_reference_generator(mut self, references: ReferenceGenerator) -> Self {
        self.references = references;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------------

    /// Place an order for `caller_id`, reserving stock for every cart line.
    pub async fn create_order(&self, cart: &[CartLine], caller_id: Uuid) -> Result<Order, OrderError> {
        let started = Instant::now();

        validate_cart(cart).map_err(|e| self.rejected(e))?;

        let result = retry_on_transient(&self.retry, "create_order", move |attempt| {
            if attempt > 1 {
                self.metrics.order_attempt_retries.inc();
            }
            self.create_with_fresh_reference(cart, caller_id)
        })
        .await;

        match result {
            Ok(order) => {
                let units: i64 = order.items().iter().map(|item| item.quantity as i64).sum();
                self.metrics
                    .record_order_created(units.max(0) as u64, started.elapsed().as_secs_f64());

                tracing::info!(
                    order_id = %order.id,
                    reference = %order.reference,
                    user_id = %caller_id,
                    item_count = order.items().len(),
                    total = %order.total(),
                    "Order created"
                );
                Ok(order)
            }
            Err(err) => Err(self.rejected(err)),
        }
    }

    /// Re-runs the attempt with a new reference for as long as another order
    /// wins the race for the drawn code. Collisions never count against the
    /// conflict retry budget and never reach the caller.
    async fn create_with_fresh_reference(&self, cart: &[CartLine], caller_id: Uuid) -> Result<Order, OrderError> {
        loop {
            match self.try_create_order(cart, caller_id).await {
                Err(OrderError::ReferenceCollision(code)) => {
                    self.metrics.record_reference_collisions(1);
                    tracing::debug!(reference = %code, "Reference taken before insert, drawing another");
                }
                other => return other,
            }
        }
    }

    async fn try_create_order(&self, cart: &[CartLine], caller_id: Uuid) -> Result<Order, OrderError> {
        let user = self
            .store
            .find_user(caller_id)
            .await?
            .ok_or(OrderError::UserNotFound(caller_id))?;

        // Drawn before BEGIN so uniqueness reads never wait on product locks
        let generated = self.references.generate(self.store.as_ref()).await?;
        self.metrics.record_reference_collisions(generated.collisions);

        let mut tx = self.store.begin().await?;

        match Self::reserve_and_insert(&mut tx, user.id, cart, generated.reference).await {
            Ok(order) => {
                tx.commit().await?;
                Ok(order)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(
                        error = %rollback_err,
                        "Rollback failed, connection will discard the transaction"
                    );
                }
                Err(err)
            }
        }
    }

    async fn reserve_and_insert(
        tx: &mut S::Tx,
        user_id: Uuid,
        cart: &[CartLine],
        reference: OrderReference,
    ) -> Result<Order, OrderError> {
        let mut draft = OrderDraft::new(user_id, Utc::now());

        for line in cart {
            let mut product = tx
                .lock_product(line.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(line.product_id))?;

            let price_at_reservation = product.reserve(line.quantity)?;
            tx.save_product(&product).await?;

            tracing::debug!(
                order_id = %draft.id(),
                product_id = %product.id,
                reserved = line.quantity,
                remaining = product.quantity,
                "Reserved stock"
            );

            draft.add_line(&product, line.quantity, price_at_reservation);
        }

        let order = draft.finalize(reference);
        tx.insert_order(&order).await.map_err(|e| match e {
            // Another order took the code after it was drawn
            StoreError::DuplicateReference(code) => OrderError::ReferenceCollision(code),
            other => OrderError::Store(other),
        })?;
        Ok(order)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Customer cancellation of their own `Pending` order.
    pub async fn cancel_order(&self, order_id: Uuid, caller_id: Uuid) -> Result<Order, OrderError> {
        loop {
            let mut order = self.load(order_id).await?;
            let from = order.status;

            order
                .cancel_by(caller_id, Utc::now())
                .map_err(|e| self.rejected(e))?;

            if self.store.update_order_status(&order, from).await? {
                self.metrics.record_transition(from, order.status);
                tracing::info!(
                    order_id = %order.id,
                    reference = %order.reference,
                    "Order cancelled by customer"
                );
                return Ok(order);
            }

            tracing::debug!(order_id = %order_id, "Order status changed concurrently, re-checking");
        }
    }

    /// Administrative status change. No transition table, no ownership check:
    /// the caller's role is verified at the boundary.
    pub async fn change_status(&self, order_id: Uuid, new_status: OrderStatus) -> Result<Order, OrderError> {
        loop {
            let mut order = self.load(order_id).await?;
            let from = order.force_status(new_status, Utc::now());

            if self.store.update_order_status(&order, from).await? {
                if from.is_terminal() && from != new_status {
                    tracing::warn!(
                        order_id = %order.id,
                        from = %from,
                        to = %new_status,
                        "Order moved out of a terminal status by administrator"
                    );
                }

                self.metrics.record_transition(from, new_status);
                tracing::info!(
                    order_id = %order.id,
                    from = %from,
                    to = %new_status,
                    "Order status changed"
                );
                return Ok(order);
            }

            tracing::debug!(order_id = %order_id, "Order status changed concurrently, re-applying");
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn get_order_by_id(&self, order_id: Uuid, caller: &Caller) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        order.ensure_readable_by(caller).map_err(|e| self.rejected(e))?;
        Ok(order)
    }

    pub async fn get_all_orders(
        &self,
        page: &PageRequest,
        direction: SortDirection,
    ) -> Result<Page<Order>, OrderError> {
        Ok(self.store.find_orders(OrderQuery::All(direction), page).await?)
    }

    /// Oldest first, the order the kitchen works through them.
    pub async fn get_orders_by_status(
        &self,
        status: OrderStatus,
        page: &PageRequest,
    ) -> Result<Page<Order>, OrderError> {
        Ok(self.store.find_orders(OrderQuery::ByStatus(status), page).await?)
    }

    /// Newest first.
    pub async fn get_orders_by_user(&self, user_id: Uuid, page: &PageRequest) -> Result<Page<Order>, OrderError> {
        Ok(self.store.find_orders(OrderQuery::ByUser(user_id), page).await?)
    }

    pub async fn get_latest_active_order(&self, user_id: Uuid) -> Result<Option<Order>, OrderError> {
        Ok(self.store.find_latest_active_order(user_id).await?)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or_else(|| self.rejected(OrderError::OrderNotFound(order_id)))
    }

    fn rejected(&self, err: OrderError) -> OrderError {
        self.metrics.record_rejection(err.label());

        match &err {
            OrderError::Store(store_err) => {
                tracing::error!(error = %store_err, "Order operation failed in the store");
            }
            other => {
                tracing::warn!(reason = other.label(), error = %other, "Order operation rejected");
            }
        }

        err
    }
}

fn validate_cart(cart: &[CartLine]) -> Result<(), OrderError> {
    if cart.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    for line in cart {
        if line.quantity < 1 {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
    }

    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
