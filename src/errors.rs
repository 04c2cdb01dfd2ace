use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::order::OrderStatus;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Unprocessable Entity",
    "message": "Quantity mismatch on order 7: item 12 is due 4, shipment proposes 3",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Order {0} not found")]
    OrderNotFound(i32),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("State mismatch on order {order_id}: expected '{expected}', found '{actual}'")]
    StateMismatch {
        order_id: i32,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error(
        "Quantity mismatch on order {order_id}: item {item_id} is due {outstanding}, shipment proposes {proposed}"
    )]
    QuantityMismatch {
        order_id: i32,
        item_id: i32,
        outstanding: i32,
        proposed: i32,
    },

    #[error("Item {item_id} does not belong to order {order_id}")]
    UnknownItem { order_id: i32, item_id: i32 },

    #[error(
        "Over-shipment on order {order_id}: item {item_id} committed {committed}, already shipped {already_shipped}, proposed {proposed}"
    )]
    OverShipment {
        order_id: i32,
        item_id: i32,
        committed: i32,
        already_shipped: i32,
        proposed: i32,
    },

    #[error("Transaction failure: {0}")]
    TransactionFailure(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Wraps a database error raised while a reconciliation transaction was open.
    pub fn transaction_failure(error: impl std::fmt::Display) -> Self {
        ServiceError::TransactionFailure(error.to_string())
    }

    /// Infrastructure failures are safe to retry with the original input;
    /// business-rule failures would fail identically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionFailure(_))
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::OrderNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::StateMismatch { .. }
            | Self::QuantityMismatch { .. }
            | Self::UnknownItem { .. }
            | Self::OverShipment { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TransactionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Database errors return a generic message to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::TransactionFailure(_) => {
                "Transaction could not be committed; retry the request".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::OrderNotFound(9).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.message, "Order 9 not found");
    }

    #[test]
    fn business_rule_errors_are_unprocessable() {
        let errors = [
            ServiceError::StateMismatch {
                order_id: 1,
                expected: OrderStatus::ShippedAndDue,
                actual: OrderStatus::Pending,
            },
            ServiceError::QuantityMismatch {
                order_id: 1,
                item_id: 2,
                outstanding: 4,
                proposed: 3,
            },
            ServiceError::UnknownItem {
                order_id: 1,
                item_id: 99,
            },
            ServiceError::OverShipment {
                order_id: 1,
                item_id: 2,
                committed: 5,
                already_shipped: 0,
                proposed: 7,
            },
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn only_transaction_failures_are_retryable() {
        assert!(ServiceError::TransactionFailure("commit".into()).is_retryable());
        assert!(!ServiceError::ValidationError("empty".into()).is_retryable());
        assert!(!ServiceError::OrderNotFound(3).is_retryable());
        assert_eq!(
            ServiceError::TransactionFailure("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("password=secret".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("password=secret".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::UnknownItem {
                order_id: 4,
                item_id: 8
            }
            .response_message(),
            "Item 8 does not belong to order 4"
        );
        assert_eq!(
            ServiceError::StateMismatch {
                order_id: 4,
                expected: OrderStatus::ShippedAndDue,
                actual: OrderStatus::Shipped,
            }
            .response_message(),
            "State mismatch on order 4: expected 'shipped and due', found 'shipped'"
        );
    }
}
