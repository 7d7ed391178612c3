//! Currency metadata and exchange-rate suggestion endpoints.
//!
//! - GET /api/v1/currencies - The closed currency set with labels/symbols
//! - GET /api/v1/rates?from=TRY&to=USD - Best-effort market rate suggestion
//!
//! The rate endpoint always answers 200: provider failure is reported inside
//! the quote (`source: "error"`), because a dead FX API must only disable
//! the pre-filled suggestion, never block manual entry.

use crate::{
    AppState,
    currency::Currency,
    error::AppError,
    models::ApiResponse,
    services::rate_service::{self, RateQuote},
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

/// One entry of the currency lookup table.
#[derive(Debug, Serialize)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub label: &'static str,
    pub symbol: &'static str,
}

const ALL_CURRENCIES: [Currency; 4] = [Currency::Try, Currency::Usd, Currency::Eur, Currency::Gbp];

/// List supported currencies with display metadata.
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "data": [
///     { "code": "TRY", "label": "Turkish Lira", "symbol": "₺" },
///     { "code": "USD", "label": "US Dollar", "symbol": "$" }
///   ]
/// }
/// ```
pub async fn list_currencies() -> impl IntoResponse {
    let currencies: Vec<CurrencyInfo> = ALL_CURRENCIES
        .into_iter()
        .map(|c| CurrencyInfo {
            code: c.code(),
            label: c.label(),
            symbol: c.symbol(),
        })
        .collect();

    ApiResponse::ok(currencies)
}

/// Query parameters for a rate suggestion.
#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub from: Currency,
    pub to: Currency,
}

/// Fetch a suggested exchange rate for a currency pair.
///
/// # Responses (all 200)
///
/// ```json
/// { "success": true, "data": { "rate": "0.032", "source": "api", "date": "2026-01-15" } }
/// ```
///
/// ```json
/// { "success": true, "data": { "rate": 1, "source": "same" } }
/// ```
///
/// ```json
/// { "success": true, "data": { "rate": null, "source": "error", "error": "..." } }
/// ```
pub async fn get_rate(
    State(state): State<AppState>,
    Query(query): Query<RateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let quote: RateQuote = rate_service::fetch_exchange_rate(
        &state.http,
        &state.fx_api_base_url,
        query.from,
        query.to,
    )
    .await;

    Ok(ApiResponse::ok(quote))
}
