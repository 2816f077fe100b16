use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{Duration, NaiveDate, Utc};
use concilia_core::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::format::{AmountColumns, BankFormat, DateLayout};

pub const MAX_DESCRIPTION_LEN: usize = 255;
const STALE_AFTER_DAYS: i64 = 730;

const DEBIT_INDICATORS: [&str; 3] = ["DR", "DEBIT", "WITHDRAWAL"];
const CREDIT_INDICATORS: [&str; 3] = ["CR", "CREDIT", "DEPOSIT"];

/// One normalized statement row. Exactly one of debit/credit is positive,
/// never both and never neither; both are always >= 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub debit: Money,
    pub credit: Money,
    pub balance: Option<Money>,
    pub type_label: Option<String>,
    /// The original row, header name to raw value, for traceability.
    pub raw: BTreeMap<String, String>,
}

impl ImportedTransaction {
    /// The single directional amount: the debit when money left the
    /// account, otherwise the credit.
    pub fn amount(&self) -> Money {
        if self.debit.is_positive() {
            self.debit
        } else {
            self.credit
        }
    }

    pub fn is_outgoing(&self) -> bool {
        self.debit.is_positive()
    }

    /// Stable structural identity: ISO date, trimmed description and both
    /// amounts. Doubles as the in-batch duplicate key.
    pub fn transaction_id(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.date.format("%Y-%m-%d"),
            self.description,
            self.debit,
            self.credit
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Data rows considered (post skip, non-blank).
    pub rows: usize,
    /// Accepted transactions after duplicate removal.
    pub valid: usize,
    pub duplicates: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    /// True iff the statement produced rows and none of them errored.
    /// Warnings do not affect success.
    pub success: bool,
    pub account_id: String,
    pub batch_id: String,
    pub transactions: Vec<ImportedTransaction>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: ImportSummary,
}

/// Import raw statement text against a bank layout. All failures come back
/// as data on the result; this function never panics and never bails on a
/// single bad row. `account_id` and `batch_id` are carried through for
/// downstream traceability only.
pub fn import_statement(
    raw_text: &str,
    format: &BankFormat,
    account_id: &str,
    batch_id: &str,
) -> ImportResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut transactions = Vec::new();
    let mut summary = ImportSummary::default();

    if raw_text.trim().is_empty() {
        errors.push("Statement is empty".to_string());
        return finish(account_id, batch_id, transactions, errors, warnings, summary);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(raw_text.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(|s| s.trim().to_string()).collect(),
        Err(e) => {
            errors.push(format!("Unreadable header row: {e}"));
            return finish(account_id, batch_id, transactions, errors, warnings, summary);
        }
    };

    // Fail fast on a misconfigured format: every required column must exist
    // in the header before any row is touched. Reference/balance columns
    // are optional extras and simply yield nothing when absent.
    let missing: Vec<&str> = format
        .required_columns()
        .into_iter()
        .filter(|name| !headers.iter().any(|h| h.eq_ignore_ascii_case(name)))
        .collect();
    if !missing.is_empty() {
        errors.push(format!(
            "Statement is missing required columns for format '{}': {}",
            format.name,
            missing.join(", ")
        ));
        return finish(account_id, batch_id, transactions, errors, warnings, summary);
    }

    let today = Utc::now().date_naive();
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for (idx, record) in reader.records().enumerate() {
        if idx < format.skip_rows {
            continue;
        }
        let row_number = idx + 1;

        let record = match record {
            Ok(r) => r,
            Err(e) => {
                summary.rows += 1;
                summary.errors += 1;
                errors.push(format!("Row {row_number}: {e}"));
                continue;
            }
        };
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        summary.rows += 1;

        match parse_row(&record, &headers, format, today) {
            Ok(parsed) => {
                for warning in parsed.warnings {
                    warnings.push(format!("Row {row_number}: {warning}"));
                }
                let key = parsed.tx.transaction_id();
                if seen.insert(key) {
                    summary.valid += 1;
                    transactions.push(parsed.tx);
                } else {
                    summary.duplicates += 1;
                    warnings.push(format!(
                        "Row {row_number}: duplicate of an earlier transaction ({} {})",
                        parsed.tx.date, parsed.tx.description
                    ));
                }
            }
            Err(message) => {
                summary.errors += 1;
                errors.push(format!("Row {row_number}: {message}"));
            }
        }
    }

    if summary.rows == 0 && errors.is_empty() {
        errors.push("Statement contains no transaction rows".to_string());
    }

    finish(account_id, batch_id, transactions, errors, warnings, summary)
}

fn finish(
    account_id: &str,
    batch_id: &str,
    transactions: Vec<ImportedTransaction>,
    errors: Vec<String>,
    warnings: Vec<String>,
    summary: ImportSummary,
) -> ImportResult {
    let result = ImportResult {
        success: errors.is_empty(),
        account_id: account_id.to_string(),
        batch_id: batch_id.to_string(),
        transactions,
        errors,
        warnings,
        summary,
    };
    tracing::debug!(
        account = %result.account_id,
        batch = %result.batch_id,
        rows = result.summary.rows,
        valid = result.summary.valid,
        duplicates = result.summary.duplicates,
        errors = result.summary.errors,
        "statement import complete"
    );
    result
}

struct ParsedRow {
    tx: ImportedTransaction,
    warnings: Vec<String>,
}

/// Looks a column up by header name, case-insensitively; blank cells read
/// as absent.
fn field<'r>(record: &'r csv::StringRecord, headers: &[String], name: &str) -> Option<&'r str> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_row(
    record: &csv::StringRecord,
    headers: &[String],
    format: &BankFormat,
    today: NaiveDate,
) -> Result<ParsedRow, String> {
    let field = |name: &str| field(record, headers, name);

    let date_field = field(&format.date_column).unwrap_or("");
    let date = parse_date(date_field, format.date_layout)
        .ok_or_else(|| format!("unparseable date '{date_field}'"))?;

    let description = field(&format.description_column)
        .map(str::to_string)
        .ok_or("missing description")?;

    let (debit, credit, type_label) = match &format.amount_columns {
        AmountColumns::DebitCredit { debit, credit } => {
            let d = field(debit).and_then(parse_amount).unwrap_or_else(Money::zero);
            let c = field(credit).and_then(parse_amount).unwrap_or_else(Money::zero);
            (d, c, None)
        }
        AmountColumns::AmountWithType { amount, type_indicator } => {
            let label = field(type_indicator).map(str::to_string);
            let amount = field(amount).and_then(parse_amount).unwrap_or_else(Money::zero);
            let (d, c) = split_amount(amount, label.as_deref());
            (d, c, label)
        }
        AmountColumns::AmountOnly { amount } => {
            let amount = field(amount).and_then(parse_amount).unwrap_or_else(Money::zero);
            let (d, c) = split_amount(amount, None);
            (d, c, None)
        }
    };

    if debit.is_negative() || credit.is_negative() {
        return Err("negative debit or credit amount".to_string());
    }
    if debit.is_zero() && credit.is_zero() {
        return Err("transaction moves no money (zero debit and credit)".to_string());
    }
    if debit.is_positive() && credit.is_positive() {
        return Err("both debit and credit are populated".to_string());
    }

    let mut row_warnings = Vec::new();
    if date > today {
        row_warnings.push("future-dated transaction".to_string());
    } else if date < today - Duration::days(STALE_AFTER_DAYS) {
        row_warnings.push("transaction is older than two years".to_string());
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        row_warnings.push(format!(
            "description exceeds {MAX_DESCRIPTION_LEN} characters"
        ));
    }

    let reference = format
        .reference_column
        .as_deref()
        .and_then(field)
        .map(str::to_string);
    let balance = format.balance_column.as_deref().and_then(field).and_then(parse_amount);

    let raw: BTreeMap<String, String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").trim().to_string()))
        .collect();

    Ok(ParsedRow {
        tx: ImportedTransaction {
            date,
            description,
            reference,
            debit,
            credit,
            balance,
            type_label,
            raw,
        },
        warnings: row_warnings,
    })
}

/// Parse with the format's declared layout first, then fall back to every
/// known layout for statements that mix conventions.
fn parse_date(s: &str, layout: DateLayout) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, layout.chrono_format()) {
        return Some(date);
    }
    DateLayout::ALL
        .iter()
        .find_map(|l| NaiveDate::parse_from_str(s, l.chrono_format()).ok())
}

/// Strips everything but digits, `.` and `-` before parsing, so currency
/// symbols and thousand separators pass through. Empty or unparseable input
/// is "no value", which is not the same thing as zero.
fn parse_amount(s: &str) -> Option<Money> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok().map(Money::from_decimal)
}

/// Splits a signed amount into (debit, credit). A recognized indicator
/// label wins; otherwise the sign decides, negative meaning debit.
fn split_amount(amount: Money, indicator: Option<&str>) -> (Money, Money) {
    if let Some(label) = indicator {
        let label = label.trim().to_uppercase();
        if DEBIT_INDICATORS.contains(&label.as_str()) {
            return (amount.abs(), Money::zero());
        }
        if CREDIT_INDICATORS.contains(&label.as_str()) {
            return (Money::zero(), amount.abs());
        }
    }
    if amount.is_negative() {
        (amount.abs(), Money::zero())
    } else {
        (Money::zero(), amount)
    }
}
