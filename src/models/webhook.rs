//! Webhook models for endpoint registration and event delivery.
//!
//! External collaborators (messaging integrations, inventory, reporting)
//! subscribe to ledger events by registering an endpoint. The ledger then
//! POSTs a signed payload on every transaction creation, correction, and
//! cancellation. Delivery is best-effort: a failed webhook never affects the
//! ledger outcome.
//!
//! # Security
//!
//! - Secrets are only shown once during registration
//! - Payloads are signed using HMAC-SHA256 (`X-Webhook-Signature`)
//! - HTTPS is required outside localhost

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::transaction::{Transaction, TransactionResponse};

/// The ledger events delivered to webhook endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "transaction.created")]
    TransactionCreated,
    #[serde(rename = "transaction.updated")]
    TransactionUpdated,
    #[serde(rename = "transaction.cancelled")]
    TransactionCancelled,
}

impl WebhookEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransactionCreated => "transaction.created",
            Self::TransactionUpdated => "transaction.updated",
            Self::TransactionCancelled => "transaction.cancelled",
        }
    }
}

/// Registered webhook endpoint.
///
/// Maps to the `webhook_endpoints` table. Endpoints are deployment-global
/// (this is an internal back office, not a multi-tenant API); `created_by`
/// records the registering admin. The `secret` is stored in plaintext because
/// HMAC generation needs it, but it is never returned after registration.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub url: String,
    pub secret: String,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Request to register a new webhook endpoint.
///
/// ```json
/// { "url": "https://example.com/ledger-events" }
/// ```
#[derive(Debug, Deserialize)]
pub struct WebhookEndpointRequest {
    pub url: String,
}

/// Response when registering or listing webhook endpoints.
///
/// The `secret` field is included only in the creation response.
#[derive(Debug, Serialize)]
pub struct WebhookEndpointResponse {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for WebhookEndpointResponse {
    fn from(endpoint: WebhookEndpoint) -> Self {
        Self {
            id: endpoint.id,
            url: endpoint.url,
            secret: None, // Never include secret by default
            is_active: endpoint.is_active,
            created_at: endpoint.created_at,
        }
    }
}

impl WebhookEndpointResponse {
    /// Create response with secret included (only for registration).
    pub fn with_secret(mut self, secret: String) -> Self {
        self.secret = Some(secret);
        self
    }
}

/// Webhook payload sent to the registered endpoint.
///
/// # Example
///
/// ```json
/// {
///   "event_type": "transaction.cancelled",
///   "event_id": "550e8400-e29b-41d4-a716-446655440000",
///   "created_at": "2026-01-15T10:30:00Z",
///   "data": {
///     "transaction": {
///       "id": "...",
///       "transaction_number": "TXN-000042",
///       "transaction_type": "expense",
///       "status": "cancelled",
///       "amount_cents": 5000,
///       "currency": "TRY"
///     }
///   }
/// }
/// ```
///
/// The `X-Webhook-Signature` header carries `sha256=<hex>` of
/// HMAC-SHA256(secret, body); consumers should verify it with a
/// constant-time comparison.
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub event_type: WebhookEventType,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub data: WebhookData,
}

/// Data portion of the webhook payload.
#[derive(Debug, Serialize)]
pub struct WebhookData {
    pub transaction: TransactionResponse,
}

impl WebhookPayload {
    /// Build the payload for a transaction event.
    pub fn new(event_id: Uuid, event_type: WebhookEventType, transaction: Transaction) -> Self {
        Self {
            event_type,
            event_id,
            created_at: Utc::now(),
            data: WebhookData {
                transaction: transaction.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_serialize_with_dotted_names() {
        assert_eq!(
            serde_json::to_string(&WebhookEventType::TransactionCreated).unwrap(),
            "\"transaction.created\""
        );
        assert_eq!(
            WebhookEventType::TransactionCancelled.as_str(),
            "transaction.cancelled"
        );
    }

    #[test]
    fn endpoint_response_hides_secret_by_default() {
        let endpoint = WebhookEndpoint {
            id: Uuid::new_v4(),
            url: "https://example.com/hook".to_string(),
            secret: "s3cret".to_string(),
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        let listed = WebhookEndpointResponse::from(endpoint.clone());
        assert!(listed.secret.is_none());

        let created = WebhookEndpointResponse::from(endpoint).with_secret("s3cret".to_string());
        assert_eq!(created.secret.as_deref(), Some("s3cret"));
    }
}
