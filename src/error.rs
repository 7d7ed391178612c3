//! Error types and HTTP error response handling.
//!
//! Every failure mode in the ledger maps to one `AppError` variant, and every
//! variant is rendered as a `{"success": false, "error": {code, message}}`
//! JSON body. Callers never see a thrown exception or a half-applied write:
//! any error raised inside a database transaction rolls the whole unit back.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Database**: any sqlx error (connection, query, constraint)
/// - **Authentication**: invalid or missing admin API keys
/// - **Resource**: referenced account/transaction/webhook does not exist
/// - **Business rules**: insufficient funds, immutable cancelled transactions
/// - **Validation**: malformed or out-of-range request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps any `sqlx::Error` via `#[from]`. Details are logged but hidden
    /// from the HTTP client.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Admin API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid admin API key")]
    InvalidAdminKey,

    /// Referenced account does not exist or is inactive.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Account not found")]
    AccountNotFound,

    /// Referenced transaction does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// Referenced webhook endpoint does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Webhook endpoint not found")]
    WebhookNotFound,

    /// The from-leg amount exceeds the available balance in that currency.
    ///
    /// Raised by exchanges and transfers always, and by expenses only when
    /// the account has `allow_overdraft = false`.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// The transaction is in a state that forbids the operation, e.g. editing
    /// or cancelling an already-cancelled transaction.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Invalid transaction state: {0}")]
    InvalidState(String),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request. The String says what was invalid.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Webhook endpoint URL failed validation.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),
}

/// Convert AppError into an HTTP response.
///
/// All errors share one JSON shape so clients can render them inline:
///
/// ```json
/// {
///   "success": false,
///   "error": {
///     "code": "insufficient_funds",
///     "message": "Insufficient funds"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidAdminKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_admin_key",
                self.to_string(),
            ),
            AppError::AccountNotFound => {
                (StatusCode::NOT_FOUND, "account_not_found", self.to_string())
            }
            AppError::TransactionNotFound => (
                StatusCode::NOT_FOUND,
                "transaction_not_found",
                self.to_string(),
            ),
            AppError::WebhookNotFound => {
                (StatusCode::NOT_FOUND, "webhook_not_found", self.to_string())
            }
            AppError::InsufficientFunds => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_funds",
                self.to_string(),
            ),
            AppError::InvalidState(ref msg) => {
                (StatusCode::CONFLICT, "invalid_state", msg.clone())
            }
            AppError::Validation(ref msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            AppError::InvalidWebhookUrl(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_webhook_url", msg.clone())
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        let cases = [
            (AppError::InvalidAdminKey, StatusCode::UNAUTHORIZED),
            (AppError::AccountNotFound, StatusCode::NOT_FOUND),
            (AppError::TransactionNotFound, StatusCode::NOT_FOUND),
            (AppError::WebhookNotFound, StatusCode::NOT_FOUND),
            (
                AppError::InsufficientFunds,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::InvalidState("cancelled".into()),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Validation("amount".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::InvalidWebhookUrl("scheme".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn database_errors_hide_details() {
        let response = AppError::Database(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
