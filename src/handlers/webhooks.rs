//! HTTP handlers for webhook endpoint management.
//!
//! Admins register, list, and delete the endpoints that receive
//! transaction lifecycle notifications.

use axum::{
    Extension,
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::AdminContext;
use crate::models::ApiResponse;
use crate::models::webhook::{WebhookEndpointRequest, WebhookEndpointResponse};
use crate::services::webhook_service;

/// Register a new webhook endpoint.
///
/// # Request Body
///
/// ```json
/// {
///   "url": "https://example.com/webhook"
/// }
/// ```
///
/// # Response
///
/// Returns 201 Created with the endpoint details. The `secret` is only
/// returned once, here; list operations never include it.
///
/// # Security
///
/// - HTTPS URLs required (HTTP localhost allowed for development)
/// - Secret is a 64-character hex string for HMAC-SHA256 signatures
pub async fn create_webhook(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(request): Json<WebhookEndpointRequest>,
) -> Result<impl IntoResponse, AppError> {
    let endpoint =
        webhook_service::create_webhook_endpoint(&state.pool, admin.admin_user_id, request).await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(endpoint)))
}

/// List all active webhook endpoints (secrets omitted).
pub async fn list_webhooks(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let webhooks: Vec<WebhookEndpointResponse> =
        webhook_service::list_webhook_endpoints(&state.pool).await?;

    Ok(ApiResponse::ok(webhooks))
}

/// Delete a webhook endpoint (soft delete).
///
/// Sets `is_active = false` so delivered event history is preserved.
/// Returns 204 No Content, or 404 if the endpoint does not exist.
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(webhook_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    webhook_service::delete_webhook_endpoint(&state.pool, webhook_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
