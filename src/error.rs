use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared across handlers.
pub mod msg {
    pub const EMAIL_REQUIRED: &str = "Email is required to deliver the purchased files";
    pub const EMAIL_EMPTY: &str = "Email cannot be empty";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const NO_ITEMS: &str = "No items provided";
    pub const INVALID_QUANTITY: &str = "Quantity must be a positive integer";
    pub const MATERIAL_NOT_FOUND: &str = "Material not found";
    pub const MATERIAL_NOT_PURCHASABLE: &str = "Material has no price set";
    pub const PAYMENT_INTENT_ID_REQUIRED: &str = "payment_intent_id is required";
    pub const PAYMENT_INTENT_NOT_FOUND: &str = "Payment intent not found";
    pub const INVALID_PAYMENT_INTENT_ID: &str = "Invalid payment_intent_id";
    pub const CONTACT_FIELDS_REQUIRED: &str = "email, name and message are required";
    pub const MESSAGE_REQUIRED: &str = "message is required";
    pub const EMAIL_SEND_FAILED: &str = "Failed to send email";
    pub const CONSENT_REQUIRED: &str = "Consent is required";
    pub const CONSENT_NOT_GIVEN: &str =
        "Newsletter subscription requires explicit consent to receive marketing emails";
    pub const TITLE_EMPTY: &str = "Title cannot be empty";
    pub const INVALID_PRICE: &str = "Price must be a non-negative number";
    pub const NO_UPDATE_FIELDS: &str = "No fields to update";
    pub const MISSING_SIGNATURE_HEADER: &str = "Missing stripe-signature header";
    pub const INVALID_SIGNATURE_HEADER: &str = "Invalid signature header";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_SIGNATURE: &str = "Invalid signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
    pub const INVALID_EVENT_PAYLOAD: &str = "Invalid event payload";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Webhook signature error: {0}")]
    Signature(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Payment processor error: {0}")]
    Processor(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Signature(msg) => {
                tracing::warn!("Webhook rejected: {}", msg);
                (StatusCode::BAD_REQUEST, "Webhook error", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Processor(msg) => {
                tracing::error!("Payment processor error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Unable to create the payment", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Converts a missing lookup result into `AppError::NotFound`.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
