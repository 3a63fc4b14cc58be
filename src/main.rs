use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod domain;
mod health;
mod metrics;
mod store;
mod utils;

use api::AppState;
use crate::config::{AppConfig, StoreBackend};
use domain::order::OrderService;
use store::{MemoryStore, PgStore, Store};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Structured logging. RUST_LOG wins over the configured filter.
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)))
        .init();

    tracing::info!(
        backend = ?config.store.backend,
        port = config.server.port,
        "Starting café order service"
    );

    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    match config.store.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to Postgres...");
            let store = PgStore::connect(&config.store).await?;
            store.migrate().await?;
            if config.store.seed_demo_data {
                store.seed_demo_data().await?;
            }
            serve(store, metrics, &config).await
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on shutdown");
            let store = MemoryStore::new();
            if config.store.seed_demo_data {
                store.seed_demo_data().await?;
            }
            serve(store, metrics, &config).await
        }
    }
}

async fn serve<S: Store>(store: S, metrics: Arc<metrics::Metrics>, config: &AppConfig) -> anyhow::Result<()> {
    let orders = OrderService::new(Arc::new(store), metrics.clone()).with_retry_policy(config.orders.retry_policy());
    let state = web::Data::new(AppState::new(Arc::new(orders), metrics, config.pagination));

    let bind = (config.server.host.clone(), config.server.port);
    tracing::info!("Listening on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure::<S>))
        .bind(bind)?
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
