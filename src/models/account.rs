//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: database entity for a ledger account
//! - `AccountKind`: single-currency vs multi-currency mode
//! - `CreateAccountRequest` / `AccountResponse`: API types
//!
//! # Balance Storage
//!
//! Balances live in the separate `account_balances` table, one row per
//! (account, currency), stored as `i64` cents. A currency with no row reads
//! as zero - a MULTI account need not have transacted in every supported
//! currency yet. Balance rows are mutated exclusively through additive
//! upserts issued by the transaction service, never overwritten from a
//! client-held snapshot.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Currency;

/// Account mode: one fixed currency, or independent per-currency balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Exactly one currency and one scalar balance.
    Single,
    /// A set of supported currencies, each with its own balance; enables
    /// in-account exchanges.
    Multi,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `accounts` table. For `kind = 'single'` the `currency` column
/// is set and `supported_currencies` is NULL; for `kind = 'multi'` it is the
/// other way around (enforced by a CHECK constraint).
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Human-readable display label
    pub name: String,

    /// "single" or "multi"
    pub kind: String,

    /// Fixed currency code for single accounts, NULL for multi
    pub currency: Option<String>,

    /// Supported currency codes for multi accounts, NULL for single
    pub supported_currencies: Option<Vec<String>>,

    /// Whether plain expenses may drive a balance negative.
    ///
    /// Exchanges and transfers always require sufficient funds regardless of
    /// this flag; only expense creation consults it.
    pub allow_overdraft: bool,

    /// Soft-delete flag. Inactive accounts reject new transactions but keep
    /// their rows, since historical transactions still reference them.
    pub is_active: bool,

    /// Timestamp when account was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of last mutation
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The account's mode as a typed enum.
    ///
    /// The column is constrained by a database CHECK, so an unrecognized
    /// value cannot occur on a row read back from the store.
    pub fn account_kind(&self) -> AccountKind {
        if self.kind == "multi" {
            AccountKind::Multi
        } else {
            AccountKind::Single
        }
    }

    /// Whether a transaction in `currency` is permitted against this account.
    ///
    /// Single accounts accept only their fixed currency; multi accounts
    /// accept anything in `supported_currencies`.
    pub fn supports(&self, currency: Currency) -> bool {
        match self.account_kind() {
            AccountKind::Single => self.currency.as_deref() == Some(currency.code()),
            AccountKind::Multi => self
                .supported_currencies
                .as_ref()
                .is_some_and(|set| set.iter().any(|c| c == currency.code())),
        }
    }
}

/// Request body for creating a new account.
///
/// # JSON Examples
///
/// Single-currency account:
///
/// ```json
/// { "name": "Main TRY Cash", "kind": "single", "currency": "TRY" }
/// ```
///
/// Multi-currency account:
///
/// ```json
/// {
///   "name": "FX Desk",
///   "kind": "multi",
///   "supported_currencies": ["TRY", "USD", "EUR"],
///   "allow_overdraft": false
/// }
/// ```
///
/// Balances always start at zero; opening balances are recorded as income
/// transactions so the ledger explains every cent.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    /// Display name for the new account
    pub name: String,

    /// Account mode
    pub kind: AccountKind,

    /// Required when `kind` is "single"
    pub currency: Option<Currency>,

    /// Required (non-empty) when `kind` is "multi"
    pub supported_currencies: Option<Vec<Currency>>,

    /// Overdraft policy for plain expenses (defaults to permissive)
    #[serde(default = "default_allow_overdraft")]
    pub allow_overdraft: bool,
}

fn default_allow_overdraft() -> bool {
    true
}

/// Response body for account endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "FX Desk",
///   "kind": "multi",
///   "supported_currencies": ["TRY", "USD"],
///   "balances": { "TRY": 100000, "USD": 320 },
///   "allow_overdraft": false,
///   "is_active": true,
///   "created_at": "2026-01-15T10:00:00Z",
///   "updated_at": "2026-01-15T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_currencies: Option<Vec<Currency>>,
    /// Currency code -> balance in cents. Currencies the account has never
    /// transacted in are omitted (they read as zero).
    pub balances: HashMap<String, i64>,
    pub allow_overdraft: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountResponse {
    /// Build a response from an account row plus its balance rows.
    pub fn from_account(account: Account, balances: HashMap<String, i64>) -> Self {
        Self {
            id: account.id,
            kind: account.account_kind(),
            currency: account
                .currency
                .as_deref()
                .and_then(|c| Currency::from_str(c).ok()),
            supported_currencies: account.supported_currencies.as_ref().map(|set| {
                set.iter()
                    .filter_map(|c| Currency::from_str(c).ok())
                    .collect()
            }),
            name: account.name,
            balances,
            allow_overdraft: account.allow_overdraft,
            is_active: account.is_active,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_try_account() -> Account {
        Account {
            id: Uuid::new_v4(),
            name: "Main TRY Cash".to_string(),
            kind: "single".to_string(),
            currency: Some("TRY".to_string()),
            supported_currencies: None,
            allow_overdraft: true,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn multi_account(currencies: &[&str]) -> Account {
        Account {
            id: Uuid::new_v4(),
            name: "FX Desk".to_string(),
            kind: "multi".to_string(),
            currency: None,
            supported_currencies: Some(currencies.iter().map(|c| c.to_string()).collect()),
            allow_overdraft: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn single_account_supports_only_its_currency() {
        let account = single_try_account();
        assert!(account.supports(Currency::Try));
        assert!(!account.supports(Currency::Usd));
    }

    #[test]
    fn multi_account_supports_its_currency_set() {
        let account = multi_account(&["TRY", "USD"]);
        assert!(account.supports(Currency::Try));
        assert!(account.supports(Currency::Usd));
        assert!(!account.supports(Currency::Eur));
    }

    #[test]
    fn account_kind_parses_from_row() {
        assert_eq!(single_try_account().account_kind(), AccountKind::Single);
        assert_eq!(multi_account(&["TRY"]).account_kind(), AccountKind::Multi);
    }

    #[test]
    fn response_omits_untransacted_currencies() {
        let account = multi_account(&["TRY", "USD", "EUR"]);
        let balances = HashMap::from([("TRY".to_string(), 100_000)]);
        let response = AccountResponse::from_account(account, balances);
        assert_eq!(response.balances.get("TRY"), Some(&100_000));
        assert!(!response.balances.contains_key("USD"));
    }
}
