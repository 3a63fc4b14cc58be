use actix_web::{web, HttpResponse};

use super::{ApiError, AppState};
use crate::health::{check_store, HealthReport};
use crate::store::Store;

pub async fn metrics<S: Store>(state: web::Data<AppState<S>>) -> Result<HttpResponse, ApiError> {
    let body = state.metrics.render()?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

pub async fn health<S: Store>(state: web::Data<AppState<S>>) -> HttpResponse {
    let report = HealthReport::from_components(vec![check_store(state.orders.store().as_ref()).await]);

    if report.status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(report)
    } else {
        HttpResponse::Ok().json(report)
    }
}
