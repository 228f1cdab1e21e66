use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::{
    checkout::CheckoutError, invoices::InvoiceError, stripe_webhook::WebhookError,
};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

/// App-level error type returned by every route handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { message: String, code: &'static str },

    #[error("{0}")]
    Authentication(String),

    #[error("Payment provider request failed")]
    Upstream(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            ApiError::Conflict { message, code } => (StatusCode::CONFLICT, code, message),
            ApiError::Authentication(message) => {
                (StatusCode::BAD_REQUEST, "WEBHOOK_VERIFICATION_FAILED", message)
            }
            ApiError::Upstream(cause) => {
                // Don't leak provider internals to the client.
                error!(error = ?cause, "upstream failure surfaced to client");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STRIPE_ERROR",
                    "Payment provider request failed".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorBody {
                message,
                code: code.to_string(),
                details: None,
            },
        });

        (status, body).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(value: CheckoutError) -> Self {
        match value {
            CheckoutError::ProductNotFound => {
                ApiError::NotFound("Product not found or inactive".to_string())
            }
            CheckoutError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            CheckoutError::InvalidQuantity => ApiError::Validation(
                "Quantity is required and must be at least 1 for credit purchases".to_string(),
            ),
            CheckoutError::SubscriptionExists => ApiError::Conflict {
                message: "You already have an active subscription for this product.".to_string(),
                code: "SUBSCRIPTION_EXISTS",
            },
            CheckoutError::Internal(cause) => ApiError::Upstream(cause),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(value: WebhookError) -> Self {
        match value {
            WebhookError::SignatureVerification => {
                ApiError::Authentication("Webhook signature verification failed".to_string())
            }
        }
    }
}

impl From<InvoiceError> for ApiError {
    fn from(value: InvoiceError) -> Self {
        match value {
            InvoiceError::InvalidQuery(message) => ApiError::Validation(message),
            InvoiceError::UserNotFound => ApiError::NotFound("User not found".to_string()),
            InvoiceError::InvoiceNotFound => ApiError::NotFound("Invoice not found".to_string()),
            InvoiceError::PdfNotAvailable => {
                ApiError::NotFound("No PDF is available for this invoice".to_string())
            }
            InvoiceError::Internal(cause) => ApiError::Upstream(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_shape_matches_contract() {
        let response = ErrorResponse {
            success: false,
            error: ErrorBody {
                message: "You already have an active subscription for this product.".to_string(),
                code: "SUBSCRIPTION_EXISTS".to_string(),
                details: None,
            },
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "SUBSCRIPTION_EXISTS");
        assert!(value["error"]["message"].is_string());
        assert!(value["error"].get("details").is_some());
    }

    #[test]
    fn conflict_maps_to_409_with_code() {
        let err: ApiError = CheckoutError::SubscriptionExists.into();
        assert!(matches!(
            err,
            ApiError::Conflict {
                code: "SUBSCRIPTION_EXISTS",
                ..
            }
        ));
    }
}
