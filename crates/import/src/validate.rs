use concilia_core::MatchCandidate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::statement::ImportedTransaction;

const AMOUNT_WARNING_PERCENT: i64 = 10;
const DATE_WARNING_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchValidation {
    /// False only on a direction inconsistency; warnings leave it true.
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Pre-commit sanity check on an already-selected pair, distinct from
/// scoring. Direction is re-checked even though the selector filters it.
pub fn validate_match(tx: &ImportedTransaction, candidate: &MatchCandidate) -> MatchValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if tx.is_outgoing() != candidate.is_outgoing() {
        errors.push(format!(
            "Direction mismatch: {} transaction against {} document",
            if tx.is_outgoing() { "outgoing" } else { "incoming" },
            candidate.kind
        ));
    }

    if !candidate.amount.is_zero() {
        let diff = tx.amount().abs_diff(candidate.amount).to_decimal();
        let percent = diff / candidate.amount.to_decimal() * Decimal::from(100);
        if percent > Decimal::from(AMOUNT_WARNING_PERCENT) {
            warnings.push(format!("Amounts differ by {:.1}%", percent));
        }
    }

    let days = (tx.date - candidate.date).num_days().abs();
    if days > DATE_WARNING_DAYS {
        warnings.push(format!("Dates are {days} days apart"));
    }

    MatchValidation { valid: errors.is_empty(), errors, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use concilia_core::{DocumentKind, Money};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(d: NaiveDate, debit_cents: i64, credit_cents: i64) -> ImportedTransaction {
        ImportedTransaction {
            date: d,
            description: "test".to_string(),
            reference: None,
            debit: Money::from_cents(debit_cents),
            credit: Money::from_cents(credit_cents),
            balance: None,
            type_label: None,
            raw: BTreeMap::new(),
        }
    }

    fn candidate(kind: DocumentKind, d: NaiveDate, amount_cents: i64) -> MatchCandidate {
        MatchCandidate {
            kind,
            id: "doc-1".to_string(),
            number: "PV-1".to_string(),
            date: d,
            amount: Money::from_cents(amount_cents),
            description: "test".to_string(),
            counterparty_id: None,
            reference: None,
        }
    }

    #[test]
    fn clean_pair_passes() {
        let v = validate_match(
            &tx(date(2024, 1, 15), 50_000, 0),
            &candidate(DocumentKind::Payment, date(2024, 1, 16), 50_000),
        );
        assert!(v.valid);
        assert!(v.errors.is_empty());
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn direction_mismatch_is_a_hard_error() {
        let v = validate_match(
            &tx(date(2024, 1, 15), 50_000, 0),
            &candidate(DocumentKind::Invoice, date(2024, 1, 15), 50_000),
        );
        assert!(!v.valid);
        assert!(v.errors[0].contains("Direction mismatch"));
        assert!(v.errors[0].contains("Invoice"));
    }

    #[test]
    fn large_amount_gap_warns_but_stays_valid() {
        let v = validate_match(
            &tx(date(2024, 1, 15), 50_000, 0),
            &candidate(DocumentKind::Payment, date(2024, 1, 15), 40_000),
        );
        assert!(v.valid);
        assert_eq!(v.warnings.len(), 1);
        assert!(v.warnings[0].contains("25.0%"));
    }

    #[test]
    fn amount_gap_at_ten_percent_does_not_warn() {
        let v = validate_match(
            &tx(date(2024, 1, 15), 44_000, 0),
            &candidate(DocumentKind::Payment, date(2024, 1, 15), 40_000),
        );
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn distant_dates_warn() {
        let v = validate_match(
            &tx(date(2024, 3, 1), 40_000, 0),
            &candidate(DocumentKind::Payment, date(2024, 1, 15), 40_000),
        );
        assert!(v.valid);
        assert!(v.warnings.iter().any(|w| w.contains("46 days")));
    }

    #[test]
    fn incoming_pair_is_direction_consistent() {
        let v = validate_match(
            &tx(date(2024, 1, 15), 0, 90_000),
            &candidate(DocumentKind::Receipt, date(2024, 1, 15), 90_000),
        );
        assert!(v.valid);
    }
}
