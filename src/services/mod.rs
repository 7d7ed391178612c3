//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! `ledger` is the pure arithmetic core; the others drive the database and
//! external collaborators.

pub mod ledger;
pub mod rate_service;
pub mod transaction_service;
pub mod webhook_service;
