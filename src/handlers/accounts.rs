//! Account management HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - POST /api/v1/accounts - Create a new account (single or multi currency)
//! - GET /api/v1/accounts - List accounts
//! - GET /api/v1/accounts/:id - Get an account with its balance map
//! - DELETE /api/v1/accounts/:id - Deactivate an account (soft delete)

use std::collections::HashMap;

use crate::{
    AppState,
    error::AppError,
    models::{
        ApiResponse,
        account::{Account, AccountKind, AccountResponse, CreateAccountRequest},
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::Row;
use uuid::Uuid;

const SELECT_ACCOUNT: &str = "SELECT id, name, kind, currency, supported_currencies, \
     allow_overdraft, is_active, created_at, updated_at FROM accounts";

/// Load the balance rows for one account as a currency -> cents map.
async fn load_balances(
    pool: &crate::db::DbPool,
    account_id: Uuid,
) -> Result<HashMap<String, i64>, AppError> {
    let rows = sqlx::query(
        "SELECT currency, balance_cents FROM account_balances WHERE account_id = $1",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get::<String, _>("currency"), row.get::<i64, _>("balance_cents")))
        .collect())
}

/// Group batched balance rows by account for the listing endpoint.
fn group_balances(rows: Vec<(Uuid, String, i64)>) -> HashMap<Uuid, HashMap<String, i64>> {
    let mut grouped: HashMap<Uuid, HashMap<String, i64>> = HashMap::new();
    for (account_id, currency, balance_cents) in rows {
        grouped
            .entry(account_id)
            .or_default()
            .insert(currency, balance_cents);
    }
    grouped
}

/// Create a new account.
///
/// # Endpoint
///
/// `POST /api/v1/accounts`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "FX Desk",
///   "kind": "multi",
///   "supported_currencies": ["TRY", "USD"],
///   "allow_overdraft": false
/// }
/// ```
///
/// # Validation
///
/// - Single accounts require `currency` and must omit `supported_currencies`
/// - Multi accounts require a non-empty `supported_currencies` set
///
/// Balances start at zero; record opening balances as income transactions so
/// the ledger explains every cent.
///
/// # Response
///
/// - **201 Created**: the created account with an empty balance map
/// - **400**: validation failure
/// - **401**: invalid admin key
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Account name is required".to_string()));
    }

    let (currency, supported) = match request.kind {
        AccountKind::Single => {
            let currency = request.currency.ok_or_else(|| {
                AppError::Validation("Single-currency account requires a currency".to_string())
            })?;
            if request.supported_currencies.is_some() {
                return Err(AppError::Validation(
                    "Single-currency account must not list supported_currencies".to_string(),
                ));
            }
            (Some(currency.code().to_string()), None)
        }
        AccountKind::Multi => {
            let supported = request.supported_currencies.as_deref().unwrap_or(&[]);
            if supported.is_empty() {
                return Err(AppError::Validation(
                    "Multi-currency account requires supported_currencies".to_string(),
                ));
            }
            if request.currency.is_some() {
                return Err(AppError::Validation(
                    "Multi-currency account must not set a single currency".to_string(),
                ));
            }
            let codes: Vec<String> = supported.iter().map(|c| c.code().to_string()).collect();
            (None, Some(codes))
        }
    };

    let account = sqlx::query_as::<_, Account>(
        "INSERT INTO accounts (name, kind, currency, supported_currencies, allow_overdraft) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, name, kind, currency, supported_currencies, allow_overdraft, \
                   is_active, created_at, updated_at",
    )
    .bind(request.name)
    .bind(request.kind.as_str())
    .bind(currency)
    .bind(supported)
    .bind(request.allow_overdraft)
    .fetch_one(&state.pool)
    .await?;

    let response = AccountResponse::from_account(account, HashMap::new());
    Ok((StatusCode::CREATED, ApiResponse::ok(response)))
}

/// Query parameters for listing accounts.
#[derive(Debug, Deserialize)]
pub struct ListAccountsQuery {
    /// Include deactivated accounts (defaults to false)
    #[serde(default)]
    pub include_inactive: bool,
}

/// List accounts with their balance maps, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/accounts[?include_inactive=true]`
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let sql = if query.include_inactive {
        format!("{SELECT_ACCOUNT} ORDER BY created_at DESC")
    } else {
        format!("{SELECT_ACCOUNT} WHERE is_active = true ORDER BY created_at DESC")
    };

    let accounts = sqlx::query_as::<_, Account>(&sql)
        .fetch_all(&state.pool)
        .await?;

    // One batched query for every balance row instead of one per account
    let ids: Vec<Uuid> = accounts.iter().map(|a| a.id).collect();
    let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
        "SELECT account_id, currency, balance_cents FROM account_balances \
         WHERE account_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;

    let mut grouped = group_balances(rows);
    let responses: Vec<AccountResponse> = accounts
        .into_iter()
        .map(|account| {
            let balances = grouped.remove(&account.id).unwrap_or_default();
            AccountResponse::from_account(account, balances)
        })
        .collect();

    Ok(ApiResponse::ok(responses))
}

/// Get a specific account with its balance map.
///
/// # Endpoint
///
/// `GET /api/v1/accounts/:id`
///
/// Currencies the account has never transacted in are absent from the map
/// and read as zero - not an error.
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = sqlx::query_as::<_, Account>(&format!("{SELECT_ACCOUNT} WHERE id = $1"))
        .bind(account_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    let balances = load_balances(&state.pool, account.id).await?;
    Ok(ApiResponse::ok(AccountResponse::from_account(
        account, balances,
    )))
}

/// Deactivate an account (soft delete).
///
/// # Endpoint
///
/// `DELETE /api/v1/accounts/:id`
///
/// The row is never removed - historical transactions keep referencing it -
/// but new transactions against it are rejected.
pub async fn deactivate_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query(
        "UPDATE accounts SET is_active = false, updated_at = NOW() WHERE id = $1 AND is_active = true",
    )
    .bind(account_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::AccountNotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_rows_group_by_account() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let grouped = group_balances(vec![
            (a, "TRY".to_string(), 100_000),
            (a, "USD".to_string(), 320),
            (b, "TRY".to_string(), -500),
        ]);

        assert_eq!(grouped[&a].len(), 2);
        assert_eq!(grouped[&a]["USD"], 320);
        assert_eq!(grouped[&b]["TRY"], -500);
        assert!(!grouped.contains_key(&Uuid::new_v4()));
    }
}
