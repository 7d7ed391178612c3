//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Performs business logic (database queries, validation)
//! 3. Returns HTTP response (JSON, status code)

/// Account management endpoints
pub mod accounts;
/// Service health endpoint
pub mod health;
/// Currency metadata and rate suggestion endpoints
pub mod rates;
/// Transaction recording, correction, and statement endpoints
pub mod transactions;
/// Webhook endpoint management
pub mod webhooks;
