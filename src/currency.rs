//! Currency enumeration and display formatting utilities.
//!
//! The currency set is a closed lookup table: adding a currency means adding
//! one enum variant plus its label/symbol arms, nothing elsewhere changes.
//!
//! All amounts in this service are integer cents (`i64`), so formatting is
//! pure integer arithmetic. Never floats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes supported by the ledger.
///
/// Serialized as the uppercase code ("TRY", "USD", ...), and stored in the
/// database as TEXT using the same code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Turkish Lira
    Try,
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// British Pound
    Gbp,
}

impl Currency {
    /// The ISO 4217 code, as stored in the database.
    pub fn code(self) -> &'static str {
        match self {
            Self::Try => "TRY",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }

    /// Human-readable display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Try => "Turkish Lira",
            Self::Usd => "US Dollar",
            Self::Eur => "Euro",
            Self::Gbp => "British Pound",
        }
    }

    /// Display symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Try => "₺",
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TRY" => Ok(Self::Try),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}

/// Format an amount of cents as a display string with the currency symbol.
///
/// # Examples
///
/// - `format_currency(123456, Currency::Try)` → `"₺1234.56"`
/// - `format_currency(-500, Currency::Usd)` → `"-$5.00"`
pub fn format_currency(amount_cents: i64, currency: Currency) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!(
        "{sign}{}{}.{:02}",
        currency.symbol(),
        abs / 100,
        abs % 100
    )
}

/// Format a timestamp as a locale-neutral `YYYY-MM-DD` date string.
pub fn format_date(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn code_round_trips_through_from_str() {
        for currency in [Currency::Try, Currency::Usd, Currency::Eur, Currency::Gbp] {
            assert_eq!(Currency::from_str(currency.code()), Ok(currency));
        }
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!(Currency::from_str("usd"), Ok(Currency::Usd));
        assert_eq!(Currency::from_str("Try"), Ok(Currency::Try));
    }

    #[test]
    fn from_str_rejects_unknown_codes() {
        assert!(Currency::from_str("BTC").is_err());
        assert!(Currency::from_str("").is_err());
    }

    #[test]
    fn labels_and_symbols() {
        assert_eq!(Currency::Try.label(), "Turkish Lira");
        assert_eq!(Currency::Try.symbol(), "₺");
        assert_eq!(Currency::Eur.symbol(), "€");
    }

    #[test]
    fn serde_uses_uppercase_codes() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
        let parsed: Currency = serde_json::from_str("\"TRY\"").unwrap();
        assert_eq!(parsed, Currency::Try);
    }

    #[test]
    fn format_currency_splits_cents() {
        assert_eq!(format_currency(123456, Currency::Try), "₺1234.56");
        assert_eq!(format_currency(100, Currency::Usd), "$1.00");
        assert_eq!(format_currency(7, Currency::Eur), "€0.07");
    }

    #[test]
    fn format_currency_handles_negative_amounts() {
        assert_eq!(format_currency(-500, Currency::Usd), "-$5.00");
        assert_eq!(format_currency(-1, Currency::Gbp), "-£0.01");
    }

    #[test]
    fn format_date_is_iso_day() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 7, 14, 30, 0).unwrap();
        assert_eq!(format_date(ts), "2026-03-07");
    }
}
