use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Shared user-facing messages.
pub mod msg {
    pub const ORDER_NOT_FOUND: &str = "Order not found";
    pub const CUSTOMER_NOT_FOUND: &str = "Customer not found";
    pub const APP_NOT_FOUND: &str = "App not found";
    pub const ROLE_NOT_FOUND: &str = "Role not found";
    pub const SESSION_NOT_FOUND: &str = "Session not found";
    pub const CHECKOUT_SESSION_NOT_FOUND: &str = "Checkout session not found";

    pub const VALIDATION_FAILED: &str = "Validation failed";
    pub const PRICE_MISMATCH: &str = "Submitted price does not match the calculated price";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const NAME_EMPTY: &str = "Name cannot be empty";
    pub const MISSING_PERMISSION: &str = "Missing permission";
    pub const CUSTOMER_EMAIL_EXISTS: &str = "A customer with this email already exists";
    pub const ROLE_NAME_EXISTS: &str = "A role with this name already exists";
    pub const BUILT_IN_ROLE: &str = "Built-in roles cannot be deleted";
    pub const UNKNOWN_PERMISSION: &str = "Unknown permission";

    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";

    pub const DOWNLOAD_NOT_READY: &str = "Build has not completed yet";
    pub const NOT_A_ZIP_DELIVERY: &str = "Order is not delivered as a download";
}

/// One failed check from payload validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0:?}")]
    Validation(Vec<FieldError>),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

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
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation(_) | AppError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing body. Server-side failures are logged here and their
    /// detail is withheld from the response.
    fn into_body(self) -> ErrorResponse {
        let (error, details, fields) = match self {
            AppError::NotFound(m) => ("Not found", Some(m), Vec::new()),
            AppError::BadRequest(m) => ("Bad request", Some(m), Vec::new()),
            AppError::Validation(fields) => (msg::VALIDATION_FAILED, None, fields),
            AppError::Unauthorized => ("Unauthorized", None, Vec::new()),
            AppError::Forbidden(m) => ("Forbidden", Some(m), Vec::new()),
            AppError::Conflict(m) => ("Conflict", Some(m), Vec::new()),
            AppError::Json(e) => ("Invalid JSON", Some(e.to_string()), Vec::new()),
            AppError::ServiceUnavailable(m) => {
                tracing::warn!("Service unavailable: {}", m);
                ("Service unavailable", None, Vec::new())
            }
            other => {
                tracing::error!("{}", other);
                ("Internal server error", None, Vec::new())
            }
        };
        ErrorResponse {
            error: error.to_string(),
            details,
            fields,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.into_body())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Turns `Option<T>` lookups into 404s.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
