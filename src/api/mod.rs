use std::sync::Arc;

use actix_web::web;

use crate::config::PaginationConfig;
use crate::domain::order::OrderService;
use crate::metrics::Metrics;
use crate::store::Store;

pub mod dto;
pub mod error;
pub mod extract;
pub mod orders;
pub mod system;

pub use error::ApiError;

// ============================================================================
// HTTP API
// ============================================================================
//
//   POST   /api/v1/orders                 place an order
//   GET    /api/v1/orders                 all orders (admin), ?status= filters
//   GET    /api/v1/orders/me              caller's orders
//   GET    /api/v1/orders/me/active       caller's latest PENDING/READY order
//   GET    /api/v1/orders/{id}            one order (owner or admin)
//   PATCH  /api/v1/orders/{id}/status     set status (admin)
//   PATCH  /api/v1/orders/{id}/cancel     cancel own PENDING order
//   GET    /metrics, /health
//
// ============================================================================

/// Shared state handed to every handler.
pub struct AppState<S: Store> {
    pub orders: Arc<OrderService<S>>,
    pub metrics: Arc<Metrics>,
    pub pagination: PaginationConfig,
}

impl<S: Store> AppState<S> {
    pub fn new(orders: Arc<OrderService<S>>, metrics: Arc<Metrics>, pagination: PaginationConfig) -> Self {
        Self {
            orders,
            metrics,
            pagination,
        }
    }
}

/// Register every route. `/orders/me*` comes before `/orders/{id}` so that
/// `me` is never parsed as an order id.
pub fn configure<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default().error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()))
    .app_data(web::PathConfig::default().error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()))
    .service(
        web::scope("/api/v1")
            .route("/orders", web::post().to(orders::create_order::<S>))
            .route("/orders", web::get().to(orders::list_orders::<S>))
            .route("/orders/me", web::get().to(orders::my_orders::<S>))
            .route("/orders/me/active", web::get().to(orders::my_active_order::<S>))
            .route("/orders/{id}", web::get().to(orders::get_order::<S>))
            .route("/orders/{id}/status", web::patch().to(orders::change_status::<S>))
            .route("/orders/{id}/cancel", web::patch().to(orders::cancel_order::<S>)),
    )
    .route("/metrics", web::get().to(system::metrics::<S>))
    .route("/health", web::get().to(system::health::<S>));
}
