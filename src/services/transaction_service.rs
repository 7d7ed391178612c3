//! Transaction service - core business logic for the ledger.
//!
//! This service handles:
//! - Creation of income, expense, exchange, and transfer transactions
//! - Post-hoc amount corrections (delta-based, see `ledger`)
//! - Cancellation (terminal reversal)
//! - Idempotency checking
//!
//! # Atomicity Guarantees
//!
//! Every operation runs inside one PostgreSQL transaction: the affected
//! account rows are locked with `SELECT ... FOR UPDATE`, balance rows are
//! mutated through additive upserts, and the transaction row is written in
//! the same unit. A failure at any point rolls back everything - there is no
//! state where the ledger row exists without its balance effect or vice
//! versa. Balance upserts add deltas rather than writing snapshots, so
//! concurrent operations on the same account serialize on the row locks and
//! compose instead of overwriting each other.

use crate::{
    currency::Currency,
    db::DbPool,
    error::AppError,
    models::{
        account::{Account, AccountKind},
        transaction::{
            ExchangeRequest, ExpenseRequest, IncomeRequest, Transaction, TransactionType,
            TransferRequest, UpdateTransactionRequest,
        },
    },
    services::ledger,
};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction as PgTransaction};
use uuid::Uuid;

const SELECT_ACCOUNT_FOR_UPDATE: &str = "SELECT id, name, kind, currency, supported_currencies, \
     allow_overdraft, is_active, created_at, updated_at \
     FROM accounts WHERE id = $1 FOR UPDATE";

/// Lock an account row for the duration of the enclosing transaction.
///
/// Inactive accounts are reported as not found: they reject new activity but
/// their historical rows remain readable elsewhere.
async fn lock_account(
    tx: &mut PgTransaction<'_, Postgres>,
    account_id: Uuid,
) -> Result<Account, AppError> {
    let account = sqlx::query_as::<_, Account>(SELECT_ACCOUNT_FOR_UPDATE)
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    if !account.is_active {
        return Err(AppError::AccountNotFound);
    }

    Ok(account)
}

/// Read a locked balance; a currency with no row reads as zero.
async fn locked_balance(
    tx: &mut PgTransaction<'_, Postgres>,
    account_id: Uuid,
    currency: Currency,
) -> Result<i64, AppError> {
    let balance: Option<i64> = sqlx::query_scalar(
        "SELECT balance_cents FROM account_balances \
         WHERE account_id = $1 AND currency = $2 FOR UPDATE",
    )
    .bind(account_id)
    .bind(currency.code())
    .fetch_optional(&mut **tx)
    .await?;

    Ok(balance.unwrap_or(0))
}

/// Apply a signed delta to one (account, currency) balance.
///
/// The upsert is additive: it never writes a balance computed from a
/// previously read snapshot, so intervening mutations are preserved.
async fn adjust_balance(
    tx: &mut PgTransaction<'_, Postgres>,
    account_id: Uuid,
    currency: Currency,
    delta_cents: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO account_balances (account_id, currency, balance_cents) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (account_id, currency) \
         DO UPDATE SET balance_cents = account_balances.balance_cents + EXCLUDED.balance_cents",
    )
    .bind(account_id)
    .bind(currency.code())
    .bind(delta_cents)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE accounts SET updated_at = NOW() WHERE id = $1")
        .bind(account_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn ensure_positive(amount_cents: i64) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }
    Ok(())
}

/// Funds check for the legs that hard-require coverage. Runs before any
/// balance adjustment, so a rejection leaves every balance row untouched.
fn ensure_sufficient(balance_cents: i64, amount_cents: i64) -> Result<(), AppError> {
    if balance_cents < amount_cents {
        return Err(AppError::InsufficientFunds);
    }
    Ok(())
}

/// Cancelled transactions are immutable: both edits and re-cancellation are
/// rejected before any balance work happens.
fn ensure_not_cancelled(t: &Transaction) -> Result<(), AppError> {
    if t.is_cancelled() {
        return Err(AppError::InvalidState(
            "Transaction is cancelled and immutable".to_string(),
        ));
    }
    Ok(())
}

fn ensure_supported(account: &Account, currency: Currency) -> Result<(), AppError> {
    if !account.supports(currency) {
        return Err(AppError::Validation(format!(
            "Account '{}' does not support {currency}",
            account.name
        )));
    }
    Ok(())
}

/// Return an existing transaction when the idempotency key was seen before.
async fn find_by_idempotency_key(
    pool: &DbPool,
    key: &Option<String>,
) -> Result<Option<Transaction>, AppError> {
    let Some(key) = key else { return Ok(None) };
    let existing =
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(existing)
}

/// True when an insert lost a race on the idempotency key: a concurrent
/// submission with the same key passed the pre-check too and committed first.
fn is_idempotency_conflict(error: &AppError) -> bool {
    match error {
        AppError::Database(sqlx::Error::Database(db)) => {
            db.is_unique_violation() && db.constraint() == Some("transactions_idempotency_key_key")
        }
        _ => false,
    }
}

/// Resolve an idempotency-key collision by returning the winner's row.
async fn replay_idempotent(
    pool: &DbPool,
    key: &Option<String>,
    error: AppError,
) -> Result<Transaction, AppError> {
    match find_by_idempotency_key(pool, key).await? {
        Some(existing) => Ok(existing),
        None => Err(error),
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_transaction(
    tx: &mut PgTransaction<'_, Postgres>,
    transaction_type: TransactionType,
    account_id: Uuid,
    currency: Currency,
    amount_cents: i64,
    to_account_id: Option<Uuid>,
    to_currency: Option<Currency>,
    to_amount_cents: Option<i64>,
    exchange_rate: Option<Decimal>,
    description: Option<String>,
    notes: Option<String>,
    inventory_transaction_id: Option<Uuid>,
    transaction_date: Option<chrono::DateTime<chrono::Utc>>,
    created_by: Uuid,
    idempotency_key: Option<String>,
) -> Result<Transaction, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            transaction_type,
            status,
            account_id,
            currency,
            amount_cents,
            to_account_id,
            to_currency,
            to_amount_cents,
            exchange_rate,
            description,
            notes,
            inventory_transaction_id,
            transaction_date,
            created_by,
            idempotency_key
        )
        VALUES ($1, 'completed', $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, NOW()), $13, $14)
        RETURNING *
        "#,
    )
    .bind(transaction_type.as_str())
    .bind(account_id)
    .bind(currency.code())
    .bind(amount_cents)
    .bind(to_account_id)
    .bind(to_currency.map(Currency::code))
    .bind(to_amount_cents)
    .bind(exchange_rate)
    .bind(description)
    .bind(notes)
    .bind(inventory_transaction_id)
    .bind(transaction_date)
    .bind(created_by)
    .bind(idempotency_key)
    .fetch_one(&mut **tx)
    .await?;

    Ok(transaction)
}

/// Record an income transaction (money entering an account).
///
/// # Process
///
/// 1. Validate amount and check the idempotency key
/// 2. Start a database transaction and lock the account
/// 3. Validate the currency against the account's supported set
/// 4. Credit the balance and record the transaction
/// 5. Commit (or roll back on any error)
pub async fn create_income(
    pool: &DbPool,
    request: IncomeRequest,
    created_by: Uuid,
) -> Result<Transaction, AppError> {
    ensure_positive(request.amount_cents)?;

    let idempotency_key = request.idempotency_key.clone();
    if let Some(existing) = find_by_idempotency_key(pool, &idempotency_key).await? {
        return Ok(existing);
    }

    let mut tx = pool.begin().await?;

    let account = lock_account(&mut tx, request.account_id).await?;
    ensure_supported(&account, request.currency)?;

    adjust_balance(&mut tx, account.id, request.currency, request.amount_cents).await?;

    let transaction = match insert_transaction(
        &mut tx,
        TransactionType::Income,
        account.id,
        request.currency,
        request.amount_cents,
        None,
        None,
        None,
        None,
        request.description,
        request.notes,
        request.inventory_transaction_id,
        request.transaction_date,
        created_by,
        request.idempotency_key,
    )
    .await
    {
        Ok(transaction) => transaction,
        Err(e) if is_idempotency_conflict(&e) => {
            tx.rollback().await?;
            return replay_idempotent(pool, &idempotency_key, e).await;
        }
        Err(e) => return Err(e),
    };

    tx.commit().await?;
    Ok(transaction)
}

/// Record an expense transaction (money leaving an account).
///
/// Overdraft policy: the balance check runs only for accounts with
/// `allow_overdraft = false`. The default is lenient - expenses can be
/// recorded against a running negative balance; exchanges and transfers move
/// real currency and always require funds.
pub async fn create_expense(
    pool: &DbPool,
    request: ExpenseRequest,
    created_by: Uuid,
) -> Result<Transaction, AppError> {
    ensure_positive(request.amount_cents)?;

    let idempotency_key = request.idempotency_key.clone();
    if let Some(existing) = find_by_idempotency_key(pool, &idempotency_key).await? {
        return Ok(existing);
    }

    let mut tx = pool.begin().await?;

    let account = lock_account(&mut tx, request.account_id).await?;
    ensure_supported(&account, request.currency)?;

    if !account.allow_overdraft {
        let balance = locked_balance(&mut tx, account.id, request.currency).await?;
        ensure_sufficient(balance, request.amount_cents)?;
    }

    adjust_balance(&mut tx, account.id, request.currency, -request.amount_cents).await?;

    let transaction = match insert_transaction(
        &mut tx,
        TransactionType::Expense,
        account.id,
        request.currency,
        request.amount_cents,
        None,
        None,
        None,
        None,
        request.description,
        request.notes,
        request.inventory_transaction_id,
        request.transaction_date,
        created_by,
        request.idempotency_key,
    )
    .await
    {
        Ok(transaction) => transaction,
        Err(e) if is_idempotency_conflict(&e) => {
            tx.rollback().await?;
            return replay_idempotent(pool, &idempotency_key, e).await;
        }
        Err(e) => return Err(e),
    };

    tx.commit().await?;
    Ok(transaction)
}

/// Record an in-account currency exchange on a multi-currency account.
///
/// # Preconditions
///
/// - Account is multi-mode and supports both currencies
/// - `from_currency != to_currency`
/// - `from_amount_cents` does not exceed the available from-currency balance
///
/// The submitted `exchange_rate` is persisted verbatim - it reflects exactly
/// what the operator confirmed, even if manually overridden from the fetched
/// market rate.
pub async fn create_exchange(
    pool: &DbPool,
    request: ExchangeRequest,
    created_by: Uuid,
) -> Result<Transaction, AppError> {
    ensure_positive(request.from_amount_cents)?;
    ensure_positive(request.to_amount_cents)?;

    if request.from_currency == request.to_currency {
        return Err(AppError::Validation(
            "Exchange requires two different currencies".to_string(),
        ));
    }
    if request.exchange_rate <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Exchange rate must be positive".to_string(),
        ));
    }

    let idempotency_key = request.idempotency_key.clone();
    if let Some(existing) = find_by_idempotency_key(pool, &idempotency_key).await? {
        return Ok(existing);
    }

    let mut tx = pool.begin().await?;

    let account = lock_account(&mut tx, request.account_id).await?;
    if account.account_kind() != AccountKind::Multi {
        return Err(AppError::Validation(
            "Exchange requires a multi-currency account".to_string(),
        ));
    }
    ensure_supported(&account, request.from_currency)?;
    ensure_supported(&account, request.to_currency)?;

    let from_balance = locked_balance(&mut tx, account.id, request.from_currency).await?;
    ensure_sufficient(from_balance, request.from_amount_cents)?;

    adjust_balance(
        &mut tx,
        account.id,
        request.from_currency,
        -request.from_amount_cents,
    )
    .await?;
    adjust_balance(
        &mut tx,
        account.id,
        request.to_currency,
        request.to_amount_cents,
    )
    .await?;

    let transaction = match insert_transaction(
        &mut tx,
        TransactionType::Exchange,
        account.id,
        request.from_currency,
        request.from_amount_cents,
        None,
        Some(request.to_currency),
        Some(request.to_amount_cents),
        Some(request.exchange_rate),
        request.description,
        request.notes,
        None,
        request.transaction_date,
        created_by,
        request.idempotency_key,
    )
    .await
    {
        Ok(transaction) => transaction,
        Err(e) if is_idempotency_conflict(&e) => {
            tx.rollback().await?;
            return replay_idempotent(pool, &idempotency_key, e).await;
        }
        Err(e) => return Err(e),
    };

    tx.commit().await?;
    Ok(transaction)
}

/// Record a transfer between two accounts, optionally cross-currency.
///
/// One logical transfer is one row referencing both accounts; statement
/// direction is derived at read time. Cross-currency transfers must carry an
/// explicit destination amount and rate; same-currency transfers move the
/// amount 1:1.
///
/// Account rows are locked in ascending id order so two concurrent transfers
/// between the same pair cannot deadlock.
pub async fn create_transfer(
    pool: &DbPool,
    request: TransferRequest,
    created_by: Uuid,
) -> Result<Transaction, AppError> {
    ensure_positive(request.from_amount_cents)?;

    let cross_currency = request.from_currency != request.to_currency;
    if request.from_account_id == request.to_account_id && !cross_currency {
        return Err(AppError::Validation(
            "Transfer must move value between different accounts or currencies".to_string(),
        ));
    }

    let to_amount_cents = if cross_currency {
        let to_amount = request.to_amount_cents.ok_or_else(|| {
            AppError::Validation(
                "Cross-currency transfer requires to_amount_cents".to_string(),
            )
        })?;
        ensure_positive(to_amount)?;
        match request.exchange_rate {
            Some(rate) if rate > Decimal::ZERO => {}
            _ => {
                return Err(AppError::Validation(
                    "Cross-currency transfer requires a positive exchange_rate".to_string(),
                ));
            }
        }
        to_amount
    } else {
        request.from_amount_cents
    };

    let idempotency_key = request.idempotency_key.clone();
    if let Some(existing) = find_by_idempotency_key(pool, &idempotency_key).await? {
        return Ok(existing);
    }

    let mut tx = pool.begin().await?;

    // Lock order by id keeps concurrent opposite-direction transfers safe
    let (from_account, to_account) = if request.from_account_id == request.to_account_id {
        let account = lock_account(&mut tx, request.from_account_id).await?;
        (account.clone(), account)
    } else if request.from_account_id < request.to_account_id {
        let from = lock_account(&mut tx, request.from_account_id).await?;
        let to = lock_account(&mut tx, request.to_account_id).await?;
        (from, to)
    } else {
        let to = lock_account(&mut tx, request.to_account_id).await?;
        let from = lock_account(&mut tx, request.from_account_id).await?;
        (from, to)
    };

    ensure_supported(&from_account, request.from_currency)?;
    ensure_supported(&to_account, request.to_currency)?;

    let from_balance = locked_balance(&mut tx, from_account.id, request.from_currency).await?;
    ensure_sufficient(from_balance, request.from_amount_cents)?;

    adjust_balance(
        &mut tx,
        from_account.id,
        request.from_currency,
        -request.from_amount_cents,
    )
    .await?;
    adjust_balance(&mut tx, to_account.id, request.to_currency, to_amount_cents).await?;

    let transaction = match insert_transaction(
        &mut tx,
        TransactionType::Transfer,
        from_account.id,
        request.from_currency,
        request.from_amount_cents,
        Some(to_account.id),
        Some(request.to_currency),
        Some(to_amount_cents),
        if cross_currency { request.exchange_rate } else { None },
        request.description,
        request.notes,
        None,
        request.transaction_date,
        created_by,
        request.idempotency_key,
    )
    .await
    {
        Ok(transaction) => transaction,
        Err(e) if is_idempotency_conflict(&e) => {
            tx.rollback().await?;
            return replay_idempotent(pool, &idempotency_key, e).await;
        }
        Err(e) => return Err(e),
    };

    tx.commit().await?;
    Ok(transaction)
}

/// Correct an existing transaction.
///
/// Amount changes go through the delta-based correction engine: the signed
/// difference is computed per leg (`ledger::amount_edit_adjustments`) and
/// fed through the same additive balance upserts as creation, inside one
/// database transaction with the row locked. Description/notes-only edits
/// touch no balances.
///
/// # Errors
///
/// - `TransactionNotFound`: no such transaction
/// - `InvalidState`: the transaction is cancelled (immutable)
/// - `Validation`: empty update, or non-positive amount
pub async fn update_transaction(
    pool: &DbPool,
    transaction_id: Uuid,
    request: UpdateTransactionRequest,
    editor_user_id: Uuid,
) -> Result<Transaction, AppError> {
    if request.is_empty() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }

    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
    )
    .bind(transaction_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::TransactionNotFound)?;

    ensure_not_cancelled(&existing)?;

    let mut new_amount_cents = existing.amount_cents;
    let mut new_to_amount_cents = existing.to_amount_cents;

    if let Some(amount) = request.amount_cents {
        let edit = ledger::amount_edit_adjustments(&existing, amount)?;
        for adjustment in &edit.adjustments {
            adjust_balance(
                &mut tx,
                adjustment.account_id,
                adjustment.currency,
                adjustment.delta_cents,
            )
            .await?;
        }
        new_amount_cents = amount;
        if edit.new_to_amount_cents.is_some() {
            new_to_amount_cents = edit.new_to_amount_cents;
        }
    }

    // Absent field keeps the stored value; an explicit null clears it
    let updated = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET amount_cents = $1,
            to_amount_cents = $2,
            description = CASE WHEN $3 THEN $4 ELSE description END,
            notes = CASE WHEN $5 THEN $6 ELSE notes END,
            transaction_date = COALESCE($7, transaction_date),
            updated_at = NOW(),
            updated_by = $8
        WHERE id = $9
        RETURNING *
        "#,
    )
    .bind(new_amount_cents)
    .bind(new_to_amount_cents)
    .bind(request.description.is_some())
    .bind(request.description.flatten())
    .bind(request.notes.is_some())
    .bind(request.notes.flatten())
    .bind(request.transaction_date)
    .bind(editor_user_id)
    .bind(transaction_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Cancel a transaction, reversing its balance effect. Terminal.
///
/// # Errors
///
/// - `TransactionNotFound`: no such transaction
/// - `InvalidState`: already cancelled (re-cancellation is rejected)
pub async fn cancel_transaction(
    pool: &DbPool,
    transaction_id: Uuid,
    editor_user_id: Uuid,
) -> Result<Transaction, AppError> {
    let mut tx = pool.begin().await?;

    let existing = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE id = $1 FOR UPDATE",
    )
    .bind(transaction_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::TransactionNotFound)?;

    ensure_not_cancelled(&existing)?;

    for adjustment in ledger::reversal_adjustments(&existing)? {
        adjust_balance(
            &mut tx,
            adjustment.account_id,
            adjustment.currency,
            adjustment.delta_cents,
        )
        .await?;
    }

    let cancelled = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = 'cancelled',
            cancelled_at = NOW(),
            cancelled_by = $1
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(editor_user_id)
    .bind(transaction_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(cancelled)
}

/// Get transaction by ID.
pub async fn get_transaction_by_id(
    pool: &DbPool,
    transaction_id: Uuid,
) -> Result<Option<Transaction>, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?;

    Ok(transaction)
}

/// List all transactions touching an account (either leg of a transfer),
/// newest first.
pub async fn list_account_transactions(
    pool: &DbPool,
    account_id: Uuid,
) -> Result<Vec<Transaction>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions \
         WHERE account_id = $1 OR to_account_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn completed_row() -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            transaction_number: 7,
            idempotency_key: None,
            transaction_type: "expense".to_string(),
            status: "completed".to_string(),
            account_id: Uuid::new_v4(),
            currency: "TRY".to_string(),
            amount_cents: 5_000,
            to_account_id: None,
            to_currency: None,
            to_amount_cents: None,
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
    fn sufficiency_guard_rejects_overdrawn_legs() {
        assert!(matches!(
            ensure_sufficient(100, 150),
            Err(AppError::InsufficientFunds)
        ));
        assert!(ensure_sufficient(150, 150).is_ok());
        assert!(ensure_sufficient(200, 150).is_ok());
    }

    #[test]
    fn missing_balance_row_reads_as_zero_and_cannot_fund_a_leg() {
        // Exchange/transfer funds checks see 0 for an untransacted currency
        assert!(matches!(
            ensure_sufficient(0, 1),
            Err(AppError::InsufficientFunds)
        ));
    }

    #[test]
    fn cancelled_rows_reject_edit_and_recancellation() {
        let mut row = completed_row();
        assert!(ensure_not_cancelled(&row).is_ok());

        row.status = "cancelled".to_string();
        assert!(matches!(
            ensure_not_cancelled(&row),
            Err(AppError::InvalidState(_))
        ));
    }

    #[test]
    fn idempotency_conflict_matches_nothing_else() {
        assert!(!is_idempotency_conflict(&AppError::Database(
            sqlx::Error::PoolTimedOut
        )));
        assert!(!is_idempotency_conflict(&AppError::Validation(
            "Amount must be positive".to_string()
        )));
        assert!(!is_idempotency_conflict(&AppError::TransactionNotFound));
    }
}
