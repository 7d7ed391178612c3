//! Pure balance arithmetic for the ledger.
//!
//! Everything here is side-effect free: given a transaction row and an
//! intent (create, edit, cancel), these functions compute the signed balance
//! adjustments to apply. The SQL layer then feeds each adjustment through an
//! additive upsert.
//!
//! # Delta-Based Correction
//!
//! Editing a historical amount never "removes the old effect and re-adds the
//! new one" as two balance reads - concurrent transactions between creation
//! and edit would make that a lost-update hazard. Instead only the signed
//! difference is computed and applied. Plain addition commutes, so the result
//! is correct regardless of what else touched the balance in between.
//!
//! Exchange and cross-currency transfer counter-legs are recomputed with the
//! transaction's *stored* rate, never a freshly fetched one: corrections
//! preserve the economic terms originally agreed.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use uuid::Uuid;

use crate::currency::Currency;
use crate::error::AppError;
use crate::models::transaction::{Transaction, TransactionType};

/// One signed balance mutation against a single (account, currency) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceAdjustment {
    pub account_id: Uuid,
    pub currency: Currency,
    pub delta_cents: i64,
}

/// Result of planning an amount edit: the balance deltas to apply plus the
/// recomputed counter-leg amount (for transfers and exchanges).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountEdit {
    pub adjustments: Vec<BalanceAdjustment>,
    pub new_to_amount_cents: Option<i64>,
}

/// Parse a currency code stored on a row.
///
/// Codes are validated at creation, so a miss here means a corrupted row.
fn parse_currency(code: &str) -> Result<Currency, AppError> {
    code.parse()
        .map_err(|_| AppError::Validation(format!("Unrecognized currency on transaction: {code}")))
}

fn parse_type(t: &Transaction) -> Result<TransactionType, AppError> {
    t.transaction_type.parse().map_err(|_| {
        AppError::Validation(format!(
            "Unrecognized transaction type: {}",
            t.transaction_type
        ))
    })
}

/// Apply an exchange rate to an amount of cents, rounding half away from
/// zero to whole cents.
pub fn apply_rate(amount_cents: i64, rate: Decimal) -> Result<i64, AppError> {
    (Decimal::from(amount_cents) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::Validation("Converted amount out of range".to_string()))
}

/// The balance adjustments a transaction applied when it was created.
///
/// - income: `+amount` on (account, currency)
/// - expense: `-amount`
/// - transfer: `-amount` on the source leg, `+to_amount` on the destination
/// - exchange: `-amount` on the from currency, `+to_amount` on the to
///   currency, both within one account
pub fn creation_adjustments(t: &Transaction) -> Result<Vec<BalanceAdjustment>, AppError> {
    let currency = parse_currency(&t.currency)?;

    let adjustments = match parse_type(t)? {
        TransactionType::Income => vec![BalanceAdjustment {
            account_id: t.account_id,
            currency,
            delta_cents: t.amount_cents,
        }],
        TransactionType::Expense => vec![BalanceAdjustment {
            account_id: t.account_id,
            currency,
            delta_cents: -t.amount_cents,
        }],
        TransactionType::Transfer => {
            let to_account_id = t
                .to_account_id
                .ok_or_else(|| AppError::Validation("Transfer missing to_account_id".into()))?;
            let to_currency = match &t.to_currency {
                Some(code) => parse_currency(code)?,
                None => currency,
            };
            let to_amount = t.to_amount_cents.unwrap_or(t.amount_cents);
            vec![
                BalanceAdjustment {
                    account_id: t.account_id,
                    currency,
                    delta_cents: -t.amount_cents,
                },
                BalanceAdjustment {
                    account_id: to_account_id,
                    currency: to_currency,
                    delta_cents: to_amount,
                },
            ]
        }
        TransactionType::Exchange => {
            let to_currency = t
                .to_currency
                .as_deref()
                .map(parse_currency)
                .transpose()?
                .ok_or_else(|| AppError::Validation("Exchange missing to_currency".into()))?;
            let to_amount = t
                .to_amount_cents
                .ok_or_else(|| AppError::Validation("Exchange missing to_amount_cents".into()))?;
            vec![
                BalanceAdjustment {
                    account_id: t.account_id,
                    currency,
                    delta_cents: -t.amount_cents,
                },
                BalanceAdjustment {
                    account_id: t.account_id,
                    currency: to_currency,
                    delta_cents: to_amount,
                },
            ]
        }
    };

    Ok(adjustments)
}

/// The adjustments that undo a transaction's creation effect (cancellation).
pub fn reversal_adjustments(t: &Transaction) -> Result<Vec<BalanceAdjustment>, AppError> {
    let mut adjustments = creation_adjustments(t)?;
    for adjustment in &mut adjustments {
        adjustment.delta_cents = -adjustment.delta_cents;
    }
    Ok(adjustments)
}

/// Plan an amount edit: `delta = new - old`, signed by type, with the
/// counter-leg recomputed from the stored rate where one exists.
///
/// Zero deltas are dropped, so editing an amount to itself (or a same-leg
/// no-op) produces no balance writes.
pub fn amount_edit_adjustments(
    t: &Transaction,
    new_amount_cents: i64,
) -> Result<AmountEdit, AppError> {
    if new_amount_cents <= 0 {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }

    let currency = parse_currency(&t.currency)?;
    let delta = new_amount_cents - t.amount_cents;

    let mut edit = match parse_type(t)? {
        TransactionType::Income => AmountEdit {
            adjustments: vec![BalanceAdjustment {
                account_id: t.account_id,
                currency,
                delta_cents: delta,
            }],
            new_to_amount_cents: None,
        },
        TransactionType::Expense => AmountEdit {
            adjustments: vec![BalanceAdjustment {
                account_id: t.account_id,
                currency,
                delta_cents: -delta,
            }],
            new_to_amount_cents: None,
        },
        TransactionType::Transfer => {
            let to_account_id = t
                .to_account_id
                .ok_or_else(|| AppError::Validation("Transfer missing to_account_id".into()))?;
            let to_currency = match &t.to_currency {
                Some(code) => parse_currency(code)?,
                None => currency,
            };
            let old_to = t.to_amount_cents.unwrap_or(t.amount_cents);
            // Same-currency transfers carry no rate; the legs track 1:1
            let new_to = match t.exchange_rate {
                Some(rate) => apply_rate(new_amount_cents, rate)?,
                None => new_amount_cents,
            };
            AmountEdit {
                adjustments: vec![
                    BalanceAdjustment {
                        account_id: t.account_id,
                        currency,
                        delta_cents: -delta,
                    },
                    BalanceAdjustment {
                        account_id: to_account_id,
                        currency: to_currency,
                        delta_cents: new_to - old_to,
                    },
                ],
                new_to_amount_cents: Some(new_to),
            }
        }
        TransactionType::Exchange => {
            let to_currency = t
                .to_currency
                .as_deref()
                .map(parse_currency)
                .transpose()?
                .ok_or_else(|| AppError::Validation("Exchange missing to_currency".into()))?;
            let old_to = t
                .to_amount_cents
                .ok_or_else(|| AppError::Validation("Exchange missing to_amount_cents".into()))?;
            let rate = t
                .exchange_rate
                .ok_or_else(|| AppError::Validation("Exchange missing exchange_rate".into()))?;
            let new_to = apply_rate(new_amount_cents, rate)?;
            AmountEdit {
                adjustments: vec![
                    BalanceAdjustment {
                        account_id: t.account_id,
                        currency,
                        delta_cents: -delta,
                    },
                    BalanceAdjustment {
                        account_id: t.account_id,
                        currency: to_currency,
                        delta_cents: new_to - old_to,
                    },
                ],
                new_to_amount_cents: Some(new_to),
            }
        }
    };

    edit.adjustments.retain(|a| a.delta_cents != 0);
    Ok(edit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn base_row(transaction_type: &str, amount_cents: i64) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            transaction_number: 1,
            idempotency_key: None,
            transaction_type: transaction_type.to_string(),
            status: "completed".to_string(),
            account_id: Uuid::new_v4(),
            currency: "TRY".to_string(),
            amount_cents,
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

    fn exchange_row(from_cents: i64, to_cents: i64, rate: Decimal) -> Transaction {
        let mut t = base_row("exchange", from_cents);
        t.to_currency = Some("USD".to_string());
        t.to_amount_cents = Some(to_cents);
        t.exchange_rate = Some(rate);
        t
    }

    fn cross_transfer_row(from_cents: i64, to_cents: i64, rate: Decimal) -> Transaction {
        let mut t = base_row("transfer", from_cents);
        t.to_account_id = Some(Uuid::new_v4());
        t.to_currency = Some("USD".to_string());
        t.to_amount_cents = Some(to_cents);
        t.exchange_rate = Some(rate);
        t
    }

    /// Net the adjustments by (account, currency) to observe the total effect.
    fn net(adjustments: &[BalanceAdjustment]) -> HashMap<(Uuid, Currency), i64> {
        let mut totals = HashMap::new();
        for a in adjustments {
            *totals.entry((a.account_id, a.currency)).or_insert(0) += a.delta_cents;
        }
        totals
    }

    #[test]
    fn income_creation_credits_the_account() {
        let t = base_row("income", 100_000);
        let adjustments = creation_adjustments(&t).unwrap();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].delta_cents, 100_000);
        assert_eq!(adjustments[0].currency, Currency::Try);
    }

    #[test]
    fn expense_creation_debits_the_account() {
        let t = base_row("expense", 5_000);
        let adjustments = creation_adjustments(&t).unwrap();
        assert_eq!(adjustments[0].delta_cents, -5_000);
    }

    #[test]
    fn exchange_creation_is_account_local() {
        // {TRY: 1000.00} -> exchange 100.00 TRY into 3.20 USD at 0.032
        let t = exchange_row(10_000, 320, dec!(0.032));
        let adjustments = creation_adjustments(&t).unwrap();
        assert_eq!(adjustments.len(), 2);
        assert!(adjustments.iter().all(|a| a.account_id == t.account_id));
        assert_eq!(adjustments[0].delta_cents, -10_000);
        assert_eq!(adjustments[0].currency, Currency::Try);
        assert_eq!(adjustments[1].delta_cents, 320);
        assert_eq!(adjustments[1].currency, Currency::Usd);
    }

    #[test]
    fn transfer_creation_moves_exact_leg_amounts() {
        let t = cross_transfer_row(15_000, 480, dec!(0.032));
        let adjustments = creation_adjustments(&t).unwrap();
        assert_eq!(adjustments[0].account_id, t.account_id);
        assert_eq!(adjustments[0].delta_cents, -15_000);
        assert_eq!(adjustments[1].account_id, t.to_account_id.unwrap());
        assert_eq!(adjustments[1].delta_cents, 480);
    }

    #[test]
    fn same_currency_transfer_defaults_destination_leg() {
        let mut t = base_row("transfer", 15_000);
        t.to_account_id = Some(Uuid::new_v4());
        let adjustments = creation_adjustments(&t).unwrap();
        assert_eq!(adjustments[1].delta_cents, 15_000);
        assert_eq!(adjustments[1].currency, Currency::Try);
    }

    #[test]
    fn cancellation_negates_the_creation_effect() {
        let t = exchange_row(10_000, 320, dec!(0.032));
        let creation = creation_adjustments(&t).unwrap();
        let reversal = reversal_adjustments(&t).unwrap();

        let mut combined = creation;
        combined.extend(reversal);
        assert!(net(&combined).values().all(|&v| v == 0));
    }

    #[test]
    fn income_edit_applies_only_the_difference() {
        // 1000.00 income edited down to 700.00: balance moves by -300.00
        let t = base_row("income", 100_000);
        let edit = amount_edit_adjustments(&t, 70_000).unwrap();
        assert_eq!(edit.adjustments.len(), 1);
        assert_eq!(edit.adjustments[0].delta_cents, -30_000);
        assert_eq!(edit.new_to_amount_cents, None);
    }

    #[test]
    fn expense_edit_signs_the_delta_by_type() {
        let t = base_row("expense", 5_000);
        // Raising an expense removes more money
        let edit = amount_edit_adjustments(&t, 8_000).unwrap();
        assert_eq!(edit.adjustments[0].delta_cents, -3_000);
    }

    #[test]
    fn edit_is_idempotent_under_round_trip() {
        // A -> B, then B -> A restores the original balance exactly
        for row in [
            base_row("income", 100_000),
            base_row("expense", 4_200),
            exchange_row(10_000, 320, dec!(0.032)),
            cross_transfer_row(15_000, 480, dec!(0.032)),
        ] {
            let forward = amount_edit_adjustments(&row, 77_700).unwrap();

            let mut edited = row.clone();
            edited.amount_cents = 77_700;
            if let Some(new_to) = forward.new_to_amount_cents {
                edited.to_amount_cents = Some(new_to);
            }
            let back = amount_edit_adjustments(&edited, row.amount_cents).unwrap();

            let mut combined = forward.adjustments;
            combined.extend(back.adjustments);
            assert!(
                net(&combined).values().all(|&v| v == 0),
                "round-trip edit must net to zero for {}",
                row.transaction_type
            );
        }
    }

    #[test]
    fn exchange_edit_recomputes_counter_leg_with_stored_rate() {
        let t = exchange_row(10_000, 320, dec!(0.032));
        let edit = amount_edit_adjustments(&t, 5_000).unwrap();

        // From leg refunds 50.00 TRY, to leg gives back the difference
        assert_eq!(edit.new_to_amount_cents, Some(160));
        assert_eq!(edit.adjustments[0].delta_cents, 5_000);
        assert_eq!(edit.adjustments[0].currency, Currency::Try);
        assert_eq!(edit.adjustments[1].delta_cents, -160);
        assert_eq!(edit.adjustments[1].currency, Currency::Usd);
    }

    #[test]
    fn same_currency_transfer_edit_tracks_one_to_one() {
        let mut t = base_row("transfer", 15_000);
        t.to_account_id = Some(Uuid::new_v4());
        let edit = amount_edit_adjustments(&t, 20_000).unwrap();
        assert_eq!(edit.new_to_amount_cents, Some(20_000));
        assert_eq!(edit.adjustments[0].delta_cents, -5_000);
        assert_eq!(edit.adjustments[1].delta_cents, 5_000);
    }

    #[test]
    fn no_op_edit_produces_no_adjustments() {
        let t = base_row("income", 100_000);
        let edit = amount_edit_adjustments(&t, 100_000).unwrap();
        assert!(edit.adjustments.is_empty());
    }

    #[test]
    fn edit_rejects_non_positive_amounts() {
        let t = base_row("income", 100_000);
        assert!(matches!(
            amount_edit_adjustments(&t, 0),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            amount_edit_adjustments(&t, -5),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn apply_rate_rounds_half_away_from_zero() {
        assert_eq!(apply_rate(10_000, dec!(0.032)).unwrap(), 320);
        assert_eq!(apply_rate(100, dec!(0.0325)).unwrap(), 3); // 3.25 -> 3
        assert_eq!(apply_rate(50, dec!(0.031)).unwrap(), 2); // 1.55 -> 2
        assert_eq!(apply_rate(100, dec!(0.0350)).unwrap(), 4); // 3.5 -> 4
    }
}
