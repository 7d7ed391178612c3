//! Webhook service for notifying external collaborators of ledger events.
//!
//! Messaging integrations, inventory, and reporting systems subscribe by
//! registering an endpoint. Every transaction creation, correction, and
//! cancellation is delivered as an HMAC-signed JSON POST.
//!
//! # Error Handling
//!
//! Delivery is strictly best-effort: individual failures are logged and
//! recorded, and never propagate back into the ledger operation that
//! triggered them. The ledger's outcome was already committed before
//! notification begins.

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::transaction::Transaction;
use crate::models::webhook::{
    WebhookEndpoint, WebhookEndpointRequest, WebhookEndpointResponse, WebhookEventType,
    WebhookPayload,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Register a new webhook endpoint.
///
/// Generates a 32-byte random secret (64 hex characters) and returns it once;
/// it is never shown again.
pub async fn create_webhook_endpoint(
    pool: &DbPool,
    created_by: Uuid,
    request: WebhookEndpointRequest,
) -> Result<WebhookEndpointResponse, AppError> {
    validate_webhook_url(&request.url)?;

    let secret = generate_secret();

    let endpoint = sqlx::query_as::<_, WebhookEndpoint>(
        r#"
        INSERT INTO webhook_endpoints (url, secret, created_by)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&request.url)
    .bind(&secret)
    .bind(created_by)
    .fetch_one(pool)
    .await?;

    Ok(WebhookEndpointResponse::from(endpoint).with_secret(secret))
}

/// List active webhook endpoints (secrets excluded).
pub async fn list_webhook_endpoints(
    pool: &DbPool,
) -> Result<Vec<WebhookEndpointResponse>, AppError> {
    let endpoints = sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE is_active = true ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(endpoints.into_iter().map(Into::into).collect())
}

/// Deactivate a webhook endpoint (soft delete, preserves event history).
pub async fn delete_webhook_endpoint(pool: &DbPool, endpoint_id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE webhook_endpoints SET is_active = false WHERE id = $1")
        .bind(endpoint_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::WebhookNotFound);
    }

    Ok(())
}

/// Notify all active endpoints of a ledger event.
///
/// Called after the ledger transaction has committed. Failures are logged
/// per endpoint and swallowed; the caller's response does not depend on
/// delivery.
pub async fn notify_transaction_event(
    pool: &DbPool,
    http: &reqwest::Client,
    event_type: WebhookEventType,
    transaction: &Transaction,
) {
    let endpoints = match sqlx::query_as::<_, WebhookEndpoint>(
        "SELECT * FROM webhook_endpoints WHERE is_active = true",
    )
    .fetch_all(pool)
    .await
    {
        Ok(endpoints) => endpoints,
        Err(e) => {
            tracing::error!("Failed to load webhook endpoints: {e}");
            return;
        }
    };

    for endpoint in endpoints {
        if let Err(e) = send_webhook(pool, http, &endpoint, event_type, transaction).await {
            tracing::error!("Failed to send webhook to {}: {e:?}", endpoint.url);
            // Continue to next endpoint even if one fails
        }
    }
}

/// Deliver one signed webhook and record the attempt.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Webhook-Signature: sha256=<hex>`
/// - `X-Webhook-Event-Id: <uuid>`
async fn send_webhook(
    pool: &DbPool,
    http: &reqwest::Client,
    endpoint: &WebhookEndpoint,
    event_type: WebhookEventType,
    transaction: &Transaction,
) -> Result<(), AppError> {
    let event_id = Uuid::new_v4();

    let payload = WebhookPayload::new(event_id, event_type, transaction.clone());
    let payload_json = serde_json::to_string(&payload)
        .map_err(|e| AppError::Validation(format!("Failed to serialize payload: {e}")))?;

    let signature = generate_signature(&endpoint.secret, &payload_json);

    let response = http
        .post(&endpoint.url)
        .header("Content-Type", "application/json")
        .header("X-Webhook-Signature", &signature)
        .header("X-Webhook-Event-Id", event_id.to_string())
        .body(payload_json.clone())
        .send()
        .await;

    let (status, body) = match response {
        Ok(resp) => {
            let status = resp.status().as_u16() as i32;
            let body = resp.text().await.ok();
            (Some(status), body)
        }
        Err(e) => (None, Some(format!("Request failed: {e}"))),
    };

    let payload_value = serde_json::from_str::<serde_json::Value>(&payload_json)
        .map_err(|e| AppError::Validation(format!("Failed to parse payload: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO webhook_events (
            id,
            webhook_endpoint_id,
            transaction_id,
            event_type,
            payload,
            response_status,
            response_body
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event_id)
    .bind(endpoint.id)
    .bind(transaction.id)
    .bind(event_type.as_str())
    .bind(payload_value)
    .bind(status)
    .bind(body)
    .execute(pool)
    .await?;

    Ok(())
}

/// Generate HMAC-SHA256 signature for a webhook payload.
///
/// # Format
///
/// `sha256=<hex_encoded_hmac>`
fn generate_signature(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
    mac.update(payload.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Generate a cryptographically secure random secret (64 hex characters).
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Validate a webhook endpoint URL.
///
/// # Rules
///
/// - Must parse as a URL of at most 2048 characters
/// - HTTPS required; plain HTTP only for localhost targets
fn validate_webhook_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidWebhookUrl(
            "URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidWebhookUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            if matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("0.0.0.0")
            ) {
                Ok(())
            } else {
                Err(AppError::InvalidWebhookUrl(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidWebhookUrl(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_64_hex_characters() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_is_deterministic_and_prefixed() {
        let a = generate_signature("secret", "payload");
        let b = generate_signature("secret", "payload");
        assert_eq!(a, b);
        assert!(a.starts_with("sha256="));

        // Different secret or payload must change the signature
        assert_ne!(a, generate_signature("other", "payload"));
        assert_ne!(a, generate_signature("secret", "other"));
    }

    #[test]
    fn url_validation_enforces_https_outside_localhost() {
        assert!(validate_webhook_url("https://example.com/hook").is_ok());
        assert!(validate_webhook_url("http://localhost:4000/hook").is_ok());
        assert!(validate_webhook_url("http://127.0.0.1/hook").is_ok());
        assert!(validate_webhook_url("http://example.com/hook").is_err());
        assert!(validate_webhook_url("ftp://example.com/hook").is_err());
        assert!(validate_webhook_url("not a url").is_err());
    }

    #[test]
    fn url_validation_caps_length() {
        let long = format!("https://example.com/{}", "a".repeat(2048));
        assert!(validate_webhook_url(&long).is_err());
    }
}
