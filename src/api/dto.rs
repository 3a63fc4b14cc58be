use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ApiError, FieldErrors};
use crate::config::PaginationConfig;
use crate::domain::order::{CartLine, Order, OrderItem, OrderStatus};
use crate::store::{PageRequest, SortDirection};

// ============================================================================
// Request / Response Bodies
// ============================================================================

/// Fields are optional so that missing values show up as field errors
/// instead of a generic deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Option<Vec<OrderItemRequest>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
}

impl CreateOrderRequest {
    pub fn into_cart(self) -> Result<Vec<CartLine>, ApiError> {
        let mut errors = FieldErrors::new();

        let items = self.items.unwrap_or_default();
        if items.is_empty() {
            errors.insert("items".to_string(), "The order must contain at least one item".to_string());
        }

        let mut cart = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            if item.product_id.is_none() {
                errors.insert(format!("items[{}].productId", i), "The product is required".to_string());
            }
            match item.quantity {
                None => {
                    errors.insert(format!("items[{}].quantity", i), "The quantity is required".to_string());
                }
                Some(q) if q < 1 => {
                    errors.insert(format!("items[{}].quantity", i), "The quantity must be at least 1".to_string());
                }
                Some(_) => {}
            }

            if let (Some(product_id), Some(quantity)) = (item.product_id, item.quantity) {
                cart.push(CartLine::new(product_id, quantity));
            }
        }

        if errors.is_empty() {
            Ok(cart)
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<SortDirection>,
    pub status: Option<OrderStatus>,
}

impl PageParams {
    pub fn page_request(&self, limits: &PaginationConfig) -> PageRequest {
        let size = self
            .size
            .unwrap_or(limits.default_page_size)
            .clamp(1, limits.max_page_size.max(1));
        PageRequest::new(self.page.unwrap_or(0), size)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_reservation: Decimal,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            price_at_reservation: item.price_at_reservation,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_reference: String,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            order_reference: order.reference.to_string(),
            total: order.total(),
            status: order.status,
            created_at: order.created_at,
            items: order.items().iter().map(OrderItemResponse::from).collect(),
        }
    }
}
