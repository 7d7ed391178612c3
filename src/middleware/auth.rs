//! Admin API key authentication middleware.
//!
//! The ledger core never reaches for ambient "current user" state: this
//! middleware resolves the caller once and injects an `AdminContext`, and
//! every mutating operation receives the editor id explicitly from it.
//!
//! # Flow
//!
//! 1. Extract `Authorization: Bearer <key>` from the request
//! 2. SHA-256 the key and look the hash up among active admin keys
//! 3. Found: insert `AdminContext` into request extensions, continue
//! 4. Not found: reject with HTTP 401

use crate::{AppState, error::AppError, models::admin_key::AdminKey};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authentication context attached to authenticated requests.
///
/// Route handlers extract this to know which admin made the request; the id
/// becomes `created_by` / `updated_by` / `cancelled_by` on ledger rows.
#[derive(Debug, Clone)]
pub struct AdminContext {
    /// Id of the authenticated admin user
    pub admin_user_id: Uuid,

    /// Display name of the admin
    pub admin_name: String,
}

/// Admin key authentication middleware function.
///
/// Expected header format: `Authorization: Bearer <admin_key>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidAdminKey)?;

    let admin_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidAdminKey)?;

    // Keys are stored hashed; hash the presented key and compare
    let mut hasher = Sha256::new();
    hasher.update(admin_key.as_bytes());
    let key_hash = hex::encode(hasher.finalize());

    let key_record = sqlx::query_as::<_, AdminKey>(
        "SELECT id, key_hash, admin_name, created_at, is_active
         FROM admin_keys
         WHERE key_hash = $1 AND is_active = true",
    )
    .bind(&key_hash)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InvalidAdminKey)?;

    request.extensions_mut().insert(AdminContext {
        admin_user_id: key_record.id,
        admin_name: key_record.admin_name,
    });

    Ok(next.run(request).await)
}
