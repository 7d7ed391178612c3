//! Admin API key model.
//!
//! The ledger core treats identity as a collaborator: the only thing it needs
//! is an admin user id for `created_by` / editor audit fields. Admin keys are
//! stored as SHA-256 hashes; the plaintext key never touches the database.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents an admin API key record from the database.
///
/// Maps to the `admin_keys` table. A key identifies one admin user of the
/// back office; revoking access means flipping `is_active` rather than
/// deleting the row, so historical audit fields stay resolvable.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminKey {
    /// Unique identifier; used as the admin user id on audit fields
    pub id: Uuid,

    /// SHA-256 hash of the actual key (64 hex characters)
    pub key_hash: String,

    /// Display name of the admin this key belongs to
    pub admin_name: String,

    /// When the key was created
    pub created_at: DateTime<Utc>,

    /// Inactive keys are rejected during authentication
    pub is_active: bool,
}
