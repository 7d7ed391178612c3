//! Transaction data models and API request/response types.
//!
//! This module defines:
//! - `Transaction`: database entity for a ledger entry
//! - `TransactionType` / `TransactionStatus` / `TransferDirection` enums
//! - Request types for income, expense, exchange, and transfer creation
//! - `UpdateTransactionRequest` for post-hoc corrections
//! - `TransactionResponse` returned to clients
//!
//! # One Row Per Logical Transaction
//!
//! A transfer is a single row referencing both accounts. The "in"/"out"
//! direction shown on an account's statement is derived at read time relative
//! to the account being viewed; it is never stored twice, so the two views
//! cannot drift apart.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Currency;

/// The four ledger entry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Increases one balance.
    Income,
    /// Decreases one balance (overdraft allowed per account policy).
    Expense,
    /// Moves value between two accounts, optionally across currencies.
    Transfer,
    /// Converts value between two currencies within one multi account.
    Exchange,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
            Self::Exchange => "exchange",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            "exchange" => Ok(Self::Exchange),
            _ => Err(format!("Unknown transaction type: {s}")),
        }
    }
}

/// Transaction lifecycle state.
///
/// Balance effects apply at creation, so rows are born `completed`. The only
/// further transition is `completed -> cancelled`, which reverses the effect
/// and is terminal. `pending` is reserved for a future approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Which leg of a transfer an account statement row represents.
///
/// Derived at query time relative to the account being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// The viewed account is the destination.
    In,
    /// The viewed account is the source.
    Out,
}

/// Represents a transaction record from the database.
///
/// # Database Table
///
/// Maps to the `transactions` table. Column conventions per type:
///
/// - income/expense: `account_id`, `currency`, `amount_cents`
/// - transfer: the same three columns hold the source leg; `to_account_id`,
///   `to_currency`, `to_amount_cents` hold the destination leg
/// - exchange: `account_id` + `currency`/`amount_cents` are the from leg,
///   `to_currency`/`to_amount_cents` the to leg, `to_account_id` is NULL
///
/// `exchange_rate` is persisted verbatim as the operator confirmed it at
/// creation time. It is never recomputed, and amount edits reuse it to
/// recompute the counter leg, preserving the originally agreed terms.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Transaction {
    /// Unique identifier for this transaction
    pub id: Uuid,

    /// Sequential display number (rendered as TXN-000123)
    pub transaction_number: i64,

    /// Optional idempotency key: resubmitting the same key returns the
    /// original row instead of creating a duplicate
    pub idempotency_key: Option<String>,

    /// "income", "expense", "transfer", or "exchange"
    pub transaction_type: String,

    /// "pending", "completed", or "cancelled"
    pub status: String,

    /// Primary account affected (source leg for transfers/exchanges)
    pub account_id: Uuid,

    /// Currency of `amount_cents`
    pub currency: String,

    /// Magnitude in cents, always positive; direction implied by type
    pub amount_cents: i64,

    /// Destination account for transfers
    pub to_account_id: Option<Uuid>,

    /// Destination currency for transfers and exchanges
    pub to_currency: Option<String>,

    /// Destination amount in cents for transfers and exchanges
    pub to_amount_cents: Option<i64>,

    /// Rate as submitted at creation; immutable thereafter
    pub exchange_rate: Option<Decimal>,

    /// Human-readable description
    pub description: Option<String>,

    /// Free-form operator notes
    pub notes: Option<String>,

    /// Back-reference to an externally maintained stock movement
    pub inventory_transaction_id: Option<Uuid>,

    /// Economic date of the transaction (may differ from created_at)
    pub transaction_date: DateTime<Utc>,

    /// When the row was created
    pub created_at: DateTime<Utc>,

    /// Admin user who created the transaction
    pub created_by: Uuid,

    /// Audit fields for the last correction, if any
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Uuid>,

    /// Audit fields for cancellation, if cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
}

impl Transaction {
    /// Whether this transaction has been cancelled (and is thus immutable).
    pub fn is_cancelled(&self) -> bool {
        self.status == TransactionStatus::Cancelled.as_str()
    }

    /// Derive the transfer direction relative to a viewing account.
    ///
    /// Returns `None` for non-transfers and for accounts not party to the
    /// transfer.
    pub fn direction_for(&self, viewing_account_id: Uuid) -> Option<TransferDirection> {
        if self.transaction_type != TransactionType::Transfer.as_str() {
            return None;
        }
        if self.account_id == viewing_account_id {
            Some(TransferDirection::Out)
        } else if self.to_account_id == Some(viewing_account_id) {
            Some(TransferDirection::In)
        } else {
            None
        }
    }
}

/// Request to record an income (money entering an account).
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "currency": "TRY",
///   "amount_cents": 100000,
///   "description": "Invoice 2026-014 payment",
///   "idempotency_key": "invoice-2026-014"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct IncomeRequest {
    /// Account to credit
    pub account_id: Uuid,

    /// Must be supported by the account
    pub currency: Currency,

    /// Amount in cents, must be positive
    pub amount_cents: i64,

    pub description: Option<String>,
    pub notes: Option<String>,

    /// Optional link to a stock-movement record kept externally
    pub inventory_transaction_id: Option<Uuid>,

    /// Economic date; defaults to now
    pub transaction_date: Option<DateTime<Utc>>,

    pub idempotency_key: Option<String>,
}

/// Request to record an expense (money leaving an account).
///
/// Overdraft is permitted while the account keeps `allow_overdraft = true`;
/// only accounts that opt out get a hard sufficiency check here.
#[derive(Debug, Deserialize)]
pub struct ExpenseRequest {
    /// Account to debit
    pub account_id: Uuid,

    pub currency: Currency,

    /// Amount in cents, must be positive
    pub amount_cents: i64,

    pub description: Option<String>,
    pub notes: Option<String>,
    pub inventory_transaction_id: Option<Uuid>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
}

/// Request to exchange value between two currencies inside one multi
/// account.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "from_currency": "TRY",
///   "to_currency": "USD",
///   "from_amount_cents": 10000,
///   "to_amount_cents": 320,
///   "exchange_rate": "0.032"
/// }
/// ```
///
/// # Validation
///
/// - Account must be multi-mode and support both currencies
/// - Currencies must differ
/// - `from_amount_cents` must not exceed the available balance (hard check,
///   unlike plain expenses)
///
/// The rate is stored exactly as submitted - whether it came from the rate
/// provider or was typed over it - and is never recomputed.
#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    pub account_id: Uuid,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub from_amount_cents: i64,
    pub to_amount_cents: i64,
    pub exchange_rate: Decimal,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
}

/// Request to transfer value between two accounts.
///
/// Same-currency transfers omit `to_amount_cents` and `exchange_rate` (the
/// destination receives exactly `from_amount_cents`). Cross-currency
/// transfers must supply both explicitly.
///
/// # Validation
///
/// - Rejected when source and destination account *and* currency all match
///   (a no-op)
/// - Source must have sufficient funds in `from_currency`
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub from_currency: Currency,
    pub to_currency: Currency,
    pub from_amount_cents: i64,
    pub to_amount_cents: Option<i64>,
    pub exchange_rate: Option<Decimal>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
}

/// Request to correct an existing transaction.
///
/// Only the amount and non-financial fields are editable. Currency, accounts,
/// type, and the stored exchange rate are fixed at creation. An amount change
/// triggers the correction engine, which applies the signed difference to the
/// affected balances; description/notes-only edits touch no balances.
///
/// For `description` and `notes`, an omitted field keeps the stored value and
/// an explicit `null` clears it.
#[derive(Debug, Deserialize)]
pub struct UpdateTransactionRequest {
    /// New magnitude for the primary leg, in cents
    pub amount_cents: Option<i64>,
    #[serde(default, deserialize_with = "clearable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    pub notes: Option<Option<String>>,
    pub transaction_date: Option<DateTime<Utc>>,
}

/// Distinguish an absent field (outer `None`, keep) from an explicit JSON
/// `null` (`Some(None)`, clear).
fn clearable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateTransactionRequest {
    /// True when the request carries nothing to change.
    pub fn is_empty(&self) -> bool {
        self.amount_cents.is_none()
            && self.description.is_none()
            && self.notes.is_none()
            && self.transaction_date.is_none()
    }
}

/// Response returned for transaction operations.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "770e8400-e29b-41d4-a716-446655440002",
///   "transaction_number": "TXN-000042",
///   "transaction_type": "transfer",
///   "status": "completed",
///   "account_id": "550e8400-...",
///   "currency": "TRY",
///   "amount_cents": 15000,
///   "to_account_id": "660e8400-...",
///   "to_currency": "TRY",
///   "to_amount_cents": 15000,
///   "transfer_direction": "out",
///   "transaction_date": "2026-01-15T10:00:00Z",
///   "created_at": "2026-01-15T10:00:01Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    /// Display number, e.g. "TXN-000042"
    pub transaction_number: String,
    pub transaction_type: String,
    pub status: String,
    pub account_id: Uuid,
    pub currency: String,
    pub amount_cents: i64,
    /// Formatted primary amount, e.g. "₺1000.00"
    pub amount_display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_amount_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<Decimal>,
    /// Present only on per-account statement views of transfers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_direction: Option<TransferDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_transaction_id: Option<Uuid>,
    pub transaction_date: DateTime<Utc>,
    /// Formatted economic date, e.g. "2026-01-15"
    pub transaction_date_display: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Format the sequential number for display.
fn display_number(n: i64) -> String {
    format!("TXN-{n:06}")
}

impl From<Transaction> for TransactionResponse {
    fn from(t: Transaction) -> Self {
        // Currency codes are validated at creation; fall back to the raw
        // cents figure if a row somehow carries an unknown code.
        let amount_display = match Currency::from_str(&t.currency) {
            Ok(currency) => crate::currency::format_currency(t.amount_cents, currency),
            Err(_) => t.amount_cents.to_string(),
        };
        Self {
            id: t.id,
            transaction_number: display_number(t.transaction_number),
            amount_display,
            transaction_date_display: crate::currency::format_date(t.transaction_date),
            transaction_type: t.transaction_type,
            status: t.status,
            account_id: t.account_id,
            currency: t.currency,
            amount_cents: t.amount_cents,
            to_account_id: t.to_account_id,
            to_currency: t.to_currency,
            to_amount_cents: t.to_amount_cents,
            exchange_rate: t.exchange_rate,
            transfer_direction: None,
            description: t.description,
            notes: t.notes,
            inventory_transaction_id: t.inventory_transaction_id,
            transaction_date: t.transaction_date,
            created_at: t.created_at,
            created_by: t.created_by,
            updated_at: t.updated_at,
            cancelled_at: t.cancelled_at,
        }
    }
}

impl TransactionResponse {
    /// Attach a derived transfer direction (per-account statement views).
    pub fn with_direction(mut self, direction: Option<TransferDirection>) -> Self {
        self.transfer_direction = direction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn transfer_row(from: Uuid, to: Uuid) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            transaction_number: 42,
            idempotency_key: None,
            transaction_type: "transfer".to_string(),
            status: "completed".to_string(),
            account_id: from,
            currency: "TRY".to_string(),
            amount_cents: 15_000,
            to_account_id: Some(to),
            to_currency: Some("TRY".to_string()),
            to_amount_cents: Some(15_000),
            exchange_rate: None,
            description: None,
            notes: None,
            inventory_transaction_id: None,
            transaction_date: Utc::now(),
            created_at: Utc::now(),
            created_by: Uuid::new_v4(),
            updated_at: None,
            updated_by: None,
            cancelled_at: None,
            cancelled_by: None,
        }
    }

    #[test]
    fn direction_is_relative_to_viewing_account() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let row = transfer_row(from, to);

        assert_eq!(row.direction_for(from), Some(TransferDirection::Out));
        assert_eq!(row.direction_for(to), Some(TransferDirection::In));
        assert_eq!(row.direction_for(Uuid::new_v4()), None);
    }

    #[test]
    fn direction_is_none_for_non_transfers() {
        let from = Uuid::new_v4();
        let mut row = transfer_row(from, Uuid::new_v4());
        row.transaction_type = "income".to_string();
        row.to_account_id = None;
        assert_eq!(row.direction_for(from), None);
    }

    #[test]
    fn transaction_type_round_trips() {
        for ty in [
            TransactionType::Income,
            TransactionType::Expense,
            TransactionType::Transfer,
            TransactionType::Exchange,
        ] {
            assert_eq!(TransactionType::from_str(ty.as_str()), Ok(ty));
        }
    }

    #[test]
    fn response_formats_display_fields() {
        let row = transfer_row(Uuid::new_v4(), Uuid::new_v4());
        let response = TransactionResponse::from(row);
        assert_eq!(response.amount_display, "₺150.00");
        assert_eq!(response.transaction_number, "TXN-000042");
    }

    #[test]
    fn display_number_pads_to_six_digits() {
        assert_eq!(display_number(42), "TXN-000042");
        assert_eq!(display_number(1_234_567), "TXN-1234567");
    }

    #[test]
    fn empty_update_request_is_detected() {
        let empty = UpdateTransactionRequest {
            amount_cents: None,
            description: None,
            notes: None,
            transaction_date: None,
        };
        assert!(empty.is_empty());

        let edit = UpdateTransactionRequest {
            amount_cents: Some(700),
            ..empty
        };
        assert!(!edit.is_empty());
    }

    #[test]
    fn update_request_distinguishes_absent_from_null() {
        let keep: UpdateTransactionRequest = serde_json::from_str("{}").unwrap();
        assert!(keep.is_empty());
        assert!(keep.notes.is_none());

        let clear: UpdateTransactionRequest = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert!(!clear.is_empty());
        assert_eq!(clear.notes, Some(None));

        let set: UpdateTransactionRequest =
            serde_json::from_str(r#"{"description": "corrected wording"}"#).unwrap();
        assert_eq!(set.description, Some(Some("corrected wording".to_string())));
        assert!(set.notes.is_none());
    }
}
