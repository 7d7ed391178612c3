//! Data models representing database entities, plus the shared response
//! envelope.

use axum::Json;
use serde::Serialize;

/// Ledger account model
pub mod account;
/// Admin key authentication model
pub mod admin_key;
/// Ledger transaction model
pub mod transaction;
/// Webhook endpoint and event models
pub mod webhook;

/// Uniform success envelope for every API response.
///
/// Mirrors the error envelope produced by `AppError`: callers always receive
/// `{"success": bool, ...}` and can branch without exception handling.
///
/// ```json
/// { "success": true, "data": { ... } }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a payload in the success envelope.
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wraps_payload() {
        let Json(body) = ApiResponse::ok(vec![1, 2, 3]);
        assert!(body.success);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "success": true, "data": [1, 2, 3] })
        );
    }
}
