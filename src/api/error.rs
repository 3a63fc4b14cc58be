use std::collections::BTreeMap;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::order::OrderError;

// ============================================================================
// HTTP Error Mapping
// ============================================================================
//
// Every failure leaves the API as the same JSON shape:
//   {timestamp, status, error, message, errors?}
// Infrastructure details are logged, never returned.
//
// ============================================================================

pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Some fields are invalid")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

const GENERIC_FAILURE: &str = "An unexpected error occurred";

impl ApiError {
    fn title(&self) -> &'static str {
        match self {
            ApiError::Order(e) => match e {
                OrderError::UserNotFound(_) | OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => {
                    "Not found"
                }
                OrderError::AccessDenied(_) => "Forbidden",
                OrderError::InsufficientStock { .. }
                | OrderError::InvalidState(_)
                | OrderError::EmptyCart
                | OrderError::InvalidQuantity { .. } => "Bad Request",
                OrderError::ReferenceCollision(_) | OrderError::Store(_) => "Internal Server Error",
            },
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::Validation(_) => "Validation Failed",
            ApiError::BadRequest(_) => "Bad Request",
            ApiError::Internal(_) => "Internal Server Error",
        }
    }

    fn public_message(&self) -> String {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            return GENERIC_FAILURE.to_string();
        }
        self.to_string()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Order(e) => match e {
                OrderError::UserNotFound(_) | OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                OrderError::AccessDenied(_) => StatusCode::FORBIDDEN,
                OrderError::InsufficientStock { .. }
                | OrderError::InvalidState(_)
                | OrderError::EmptyCart
                | OrderError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
                OrderError::ReferenceCollision(_) | OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
        }

        let errors = match self {
            ApiError::Validation(fields) => Some(fields.clone()),
            _ => None,
        };

        HttpResponse::build(status).json(ErrorResponse {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: self.title(),
            message: self.public_message(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::store::StoreError;
    use actix_web::body::to_bytes;
    use uuid::Uuid;

    async fn body_json(err: ApiError) -> serde_json::Value {
        let bytes = to_bytes(err.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (ApiError::from(OrderError::UserNotFound(Uuid::nil())), StatusCode::NOT_FOUND),
            (ApiError::from(OrderError::ProductNotFound(Uuid::nil())), StatusCode::NOT_FOUND),
            (ApiError::from(OrderError::OrderNotFound(Uuid::nil())), StatusCode::NOT_FOUND),
            (
                ApiError::from(OrderError::InsufficientStock {
                    product_name: "Tea".into(),
                    available: 1,
                    requested: 2,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::from(OrderError::InvalidState(OrderStatus::Ready)), StatusCode::BAD_REQUEST),
            (ApiError::from(OrderError::EmptyCart), StatusCode::BAD_REQUEST),
            (ApiError::from(OrderError::AccessDenied("x".into())), StatusCode::FORBIDDEN),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (
                ApiError::from(OrderError::Store(StoreError::Conflict("x".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{:?}", err);
        }
    }

    #[actix_web::test]
    async fn test_insufficient_stock_payload_names_product() {
        let json = body_json(ApiError::from(OrderError::InsufficientStock {
            product_name: "Espresso".into(),
            available: 1,
            requested: 3,
        }))
        .await;

        assert_eq!(json["status"], 400);
        assert_eq!(json["error"], "Bad Request");
        let message = json["message"].as_str().unwrap();
        assert!(message.contains("Espresso"));
        assert!(message.contains("Available: 1"));
        assert!(message.contains("requested: 3"));
        assert!(json.get("errors").is_none());
    }

    #[actix_web::test]
    async fn test_internal_errors_hide_details() {
        let json = body_json(ApiError::from(OrderError::Store(StoreError::Corrupt(
            "bad row in orders".into(),
        ))))
        .await;

        assert_eq!(json["status"], 500);
        assert_eq!(json["message"], GENERIC_FAILURE);
    }

    #[actix_web::test]
    async fn test_validation_payload_lists_fields() {
        let mut fields = FieldErrors::new();
        fields.insert("items".into(), "must not be empty".into());

        let json = body_json(ApiError::Validation(fields)).await;

        assert_eq!(json["error"], "Validation Failed");
        assert_eq!(json["errors"]["items"], "must not be empty");
    }
}
