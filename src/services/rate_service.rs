//! Exchange rate provider - best-effort market rate lookup.
//!
//! This component has no authority over the ledger. It exists to pre-fill a
//! rate suggestion in the admin UI; whatever numeric rate the operator
//! submits (fetched or hand-typed) is what gets persisted on the
//! transaction. Provider failure therefore degrades to "manual entry
//! required" and is never an API error: the quote itself reports
//! `source: "error"`.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;

/// Where a quoted rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// Fetched from the third-party FX API.
    Api,
    /// Entered by the operator (recorded on submitted transactions, never
    /// produced by a fetch).
    Manual,
    /// `from == to`, short-circuited without a network call.
    Same,
    /// The fetch failed; manual entry is required.
    Error,
}

/// A rate suggestion returned to the caller.
///
/// ```json
/// { "rate": "0.032", "source": "api", "date": "2026-01-15" }
/// ```
///
/// or, on provider failure:
///
/// ```json
/// { "rate": null, "source": "error", "error": "request timed out" }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct RateQuote {
    pub rate: Option<Decimal>,
    pub source: RateSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RateQuote {
    fn same() -> Self {
        Self {
            rate: Some(Decimal::ONE),
            source: RateSource::Same,
            date: None,
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            rate: None,
            source: RateSource::Error,
            date: None,
            error: Some(message),
        }
    }
}

/// Response shape of the third-party FX API (untrusted).
#[derive(Debug, Deserialize)]
struct FxApiResponse {
    rates: HashMap<String, Decimal>,
    date: Option<String>,
}

/// Pick the requested pair out of a provider payload.
fn quote_from_payload(payload: FxApiResponse, to: Currency) -> RateQuote {
    match payload.rates.get(to.code()) {
        Some(&rate) => RateQuote {
            rate: Some(rate),
            source: RateSource::Api,
            date: payload.date,
            error: None,
        },
        None => RateQuote::error(format!("Provider returned no rate for {to}")),
    }
}

/// Fetch a suggested exchange rate for a currency pair.
///
/// - `from == to` returns `{rate: 1, source: "same"}` immediately.
/// - Any transport or payload failure returns a `source: "error"` quote; the
///   rate is never silently defaulted to 1 or to a stale cached value.
///
/// The shared `client` carries the configured timeout, so a slow provider
/// cannot hold up the request path beyond it.
pub async fn fetch_exchange_rate(
    client: &reqwest::Client,
    base_url: &str,
    from: Currency,
    to: Currency,
) -> RateQuote {
    if from == to {
        return RateQuote::same();
    }

    let url = format!("{base_url}/latest?base={from}");
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("FX rate fetch failed for {from}/{to}: {e}");
            return RateQuote::error(format!("Rate fetch failed: {e}"));
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        tracing::warn!("FX provider returned {status} for {from}/{to}");
        return RateQuote::error(format!("Provider returned HTTP {status}"));
    }

    match response.json::<FxApiResponse>().await {
        Ok(payload) => quote_from_payload(payload, to),
        Err(e) => {
            tracing::warn!("FX provider payload unparseable for {from}/{to}: {e}");
            RateQuote::error(format!("Provider payload unparseable: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payload_selection_picks_the_requested_pair() {
        let payload = FxApiResponse {
            rates: HashMap::from([
                ("USD".to_string(), dec!(0.032)),
                ("EUR".to_string(), dec!(0.029)),
            ]),
            date: Some("2026-01-15".to_string()),
        };

        let quote = quote_from_payload(payload, Currency::Usd);
        assert_eq!(quote.rate, Some(dec!(0.032)));
        assert_eq!(quote.source, RateSource::Api);
        assert_eq!(quote.date.as_deref(), Some("2026-01-15"));
        assert!(quote.error.is_none());
    }

    #[test]
    fn missing_pair_degrades_to_error_quote() {
        let payload = FxApiResponse {
            rates: HashMap::from([("EUR".to_string(), dec!(0.029))]),
            date: None,
        };

        let quote = quote_from_payload(payload, Currency::Gbp);
        assert_eq!(quote.rate, None);
        assert_eq!(quote.source, RateSource::Error);
        assert!(quote.error.is_some());
    }

    #[test]
    fn provider_payload_parses_rates_and_date() {
        let payload: FxApiResponse = serde_json::from_str(
            r#"{ "base": "TRY", "date": "2026-01-15", "rates": { "USD": 0.032 } }"#,
        )
        .unwrap();
        assert_eq!(payload.rates.get("USD"), Some(&dec!(0.032)));
        assert_eq!(payload.date.as_deref(), Some("2026-01-15"));
    }

    #[tokio::test]
    async fn same_currency_short_circuits_without_network() {
        // Unroutable base URL proves no request is attempted
        let client = reqwest::Client::new();
        let quote =
            fetch_exchange_rate(&client, "http://invalid.localhost:1", Currency::Try, Currency::Try)
                .await;
        assert_eq!(quote.rate, Some(Decimal::ONE));
        assert_eq!(quote.source, RateSource::Same);
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_error_quote() {
        let client = reqwest::Client::new();
        let quote =
            fetch_exchange_rate(&client, "http://invalid.localhost:1", Currency::Try, Currency::Usd)
                .await;
        assert_eq!(quote.rate, None);
        assert_eq!(quote.source, RateSource::Error);
        assert!(quote.error.is_some());
    }
}
