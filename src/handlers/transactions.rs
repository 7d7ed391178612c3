//! Transaction HTTP handlers.
//!
//! This module implements the ledger's transaction endpoints:
//! - POST /api/v1/transactions/income - Record money entering an account
//! - POST /api/v1/transactions/expense - Record money leaving an account
//! - POST /api/v1/transactions/exchange - In-account currency conversion
//! - POST /api/v1/transactions/transfer - Inter-account value movement
//! - PATCH /api/v1/transactions/:id - Correct amount / description / notes
//! - POST /api/v1/transactions/:id/cancel - Reverse and terminate
//! - GET /api/v1/transactions/:id - Get transaction details
//! - GET /api/v1/accounts/:id/transactions - Account statement view
//!
//! Handlers stay thin: validation and balance mutation live in
//! `transaction_service`, webhook fan-out happens after commit and never
//! affects the response.

use crate::{
    AppState,
    error::AppError,
    middleware::auth::AdminContext,
    models::{
        ApiResponse,
        transaction::{
            ExchangeRequest, ExpenseRequest, IncomeRequest, Transaction, TransactionResponse,
            TransferRequest, UpdateTransactionRequest,
        },
        webhook::WebhookEventType,
    },
    services::{transaction_service, webhook_service},
};
use axum::{
    Extension,
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Fan a committed ledger event out to webhook subscribers.
///
/// Runs on a background task: delivery latency and failures are invisible to
/// the API caller.
fn notify(state: &AppState, event_type: WebhookEventType, transaction: &Transaction) {
    let pool = state.pool.clone();
    let http = state.http.clone();
    let transaction = transaction.clone();
    tokio::spawn(async move {
        webhook_service::notify_transaction_event(&pool, &http, event_type, &transaction).await;
    });
}

/// Record an income transaction.
///
/// # Request Body
///
/// ```json
/// {
///   "account_id": "550e8400-...",
///   "currency": "TRY",
///   "amount_cents": 100000,
///   "description": "Invoice 2026-014 payment"
/// }
/// ```
///
/// # Response (201)
///
/// The created transaction wrapped in the success envelope, with
/// `status: "completed"` - balance effects apply at creation.
pub async fn create_income(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(request): Json<IncomeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction =
        transaction_service::create_income(&state.pool, request, admin.admin_user_id).await?;

    notify(&state, WebhookEventType::TransactionCreated, &transaction);
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(TransactionResponse::from(transaction)),
    ))
}

/// Record an expense transaction.
///
/// Overdraft is allowed unless the account was created with
/// `allow_overdraft: false`; see the exchange/transfer endpoints for the
/// operations that always require funds.
pub async fn create_expense(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(request): Json<ExpenseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction =
        transaction_service::create_expense(&state.pool, request, admin.admin_user_id).await?;

    notify(&state, WebhookEventType::TransactionCreated, &transaction);
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(TransactionResponse::from(transaction)),
    ))
}

/// Record an in-account currency exchange.
///
/// # Request Body
///
/// ```json
/// {
///   "account_id": "550e8400-...",
///   "from_currency": "TRY",
///   "to_currency": "USD",
///   "from_amount_cents": 10000,
///   "to_amount_cents": 320,
///   "exchange_rate": "0.032"
/// }
/// ```
///
/// The rate is persisted exactly as submitted; the rate endpoint only ever
/// supplies a suggestion for the form.
pub async fn create_exchange(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(request): Json<ExchangeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction =
        transaction_service::create_exchange(&state.pool, request, admin.admin_user_id).await?;

    notify(&state, WebhookEventType::TransactionCreated, &transaction);
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(TransactionResponse::from(transaction)),
    ))
}

/// Record a transfer between accounts.
///
/// # Atomicity
///
/// Both accounts are locked and updated inside one database transaction;
/// either both legs apply or neither does.
pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(request): Json<TransferRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction =
        transaction_service::create_transfer(&state.pool, request, admin.admin_user_id).await?;

    notify(&state, WebhookEventType::TransactionCreated, &transaction);
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(TransactionResponse::from(transaction)),
    ))
}

/// Correct an existing transaction.
///
/// # Endpoint
///
/// `PATCH /api/v1/transactions/:id`
///
/// Amount changes flow through the delta-based correction engine; editing
/// only description/notes touches no balances. Cancelled transactions are
/// immutable (409).
pub async fn update_transaction(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(transaction_id): Path<Uuid>,
    Json(request): Json<UpdateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = transaction_service::update_transaction(
        &state.pool,
        transaction_id,
        request,
        admin.admin_user_id,
    )
    .await?;

    notify(&state, WebhookEventType::TransactionUpdated, &transaction);
    Ok(ApiResponse::ok(TransactionResponse::from(transaction)))
}

/// Cancel a transaction, reversing its balance effect.
///
/// # Endpoint
///
/// `POST /api/v1/transactions/:id/cancel`
///
/// Cancellation is terminal; cancelling twice returns 409.
pub async fn cancel_transaction(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transaction =
        transaction_service::cancel_transaction(&state.pool, transaction_id, admin.admin_user_id)
            .await?;

    notify(&state, WebhookEventType::TransactionCancelled, &transaction);
    Ok(ApiResponse::ok(TransactionResponse::from(transaction)))
}

/// Get transaction by ID.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = transaction_service::get_transaction_by_id(&state.pool, transaction_id)
        .await?
        .ok_or(AppError::TransactionNotFound)?;

    Ok(ApiResponse::ok(TransactionResponse::from(transaction)))
}

/// List an account's transactions, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/accounts/:id/transactions`
///
/// Transfers appear once regardless of direction; each row carries a
/// `transfer_direction` of "in" or "out" derived relative to this account.
pub async fn list_account_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // 404 for unknown accounts rather than an empty list
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
        .bind(account_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(AppError::AccountNotFound);
    }

    let transactions =
        transaction_service::list_account_transactions(&state.pool, account_id).await?;

    let responses: Vec<TransactionResponse> = transactions
        .into_iter()
        .map(|t| {
            let direction = t.direction_for(account_id);
            TransactionResponse::from(t).with_direction(direction)
        })
        .collect();

    Ok(ApiResponse::ok(responses))
}
