use actix_web::{web, HttpResponse};
use uuid::Uuid;

use super::dto::{CreateOrderRequest, OrderResponse, PageParams, StatusChangeRequest};
use super::extract::require_admin;
use super::{ApiError, AppState};
use crate::domain::user::Caller;
use crate::store::Store;

pub async fn create_order<S: Store>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let cart = body.into_inner().into_cart()?;
    let order = state.orders.create_order(&cart, caller.user_id).await?;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

pub async fn list_orders<S: Store>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&caller)?;
    let page = params.page_request(&state.pagination);

    let orders = match params.status {
        Some(status) => state.orders.get_orders_by_status(status, &page).await?,
        None => {
            state
                .orders
                .get_all_orders(&page, params.sort.unwrap_or_default())
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(orders.map(OrderResponse::from)))
}

pub async fn my_orders<S: Store>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    params: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    let page = params.page_request(&state.pagination);
    let orders = state.orders.get_orders_by_user(caller.user_id, &page).await?;

    Ok(HttpResponse::Ok().json(orders.map(OrderResponse::from)))
}

pub async fn my_active_order<S: Store>(
    state: web::Data<AppState<S>>,
    caller: Caller,
) -> Result<HttpResponse, ApiError> {
    match state.orders.get_latest_active_order(caller.user_id).await? {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
        None => Ok(HttpResponse::NoContent().finish()),
    }
}

pub async fn get_order<S: Store>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order = state.orders.get_order_by_id(id.into_inner(), &caller).await?;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

pub async fn change_status<S: Store>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    id: web::Path<Uuid>,
    body: web::Json<StatusChangeRequest>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&caller)?;
    let order = state.orders.change_status(id.into_inner(), body.status).await?;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

pub async fn cancel_order<S: Store>(
    state: web::Data<AppState<S>>,
    caller: Caller,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order = state.orders.cancel_order(id.into_inner(), caller.user_id).await?;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
