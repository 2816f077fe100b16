use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a format represents transaction amounts. Exactly one strategy per
/// format; the variants make the "never more than one" rule structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum AmountColumns {
    /// Separate debit and credit columns, each parsed independently.
    DebitCredit { debit: String, credit: String },
    /// A single signed amount plus a DR/CR-style indicator column.
    AmountWithType { amount: String, type_indicator: String },
    /// A single signed amount; the sign decides direction.
    AmountOnly { amount: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateLayout {
    /// 15/01/2024
    DayMonthYearSlash,
    /// 15-01-2024
    DayMonthYearDash,
    /// 15-Jan-2024
    DayAbbrMonthYear,
    /// 2024-01-15
    Iso,
}

impl DateLayout {
    pub(crate) const ALL: [DateLayout; 4] = [
        DateLayout::DayMonthYearSlash,
        DateLayout::DayMonthYearDash,
        DateLayout::DayAbbrMonthYear,
        DateLayout::Iso,
    ];

    pub(crate) fn chrono_format(self) -> &'static str {
        match self {
            DateLayout::DayMonthYearSlash => "%d/%m/%Y",
            DateLayout::DayMonthYearDash => "%d-%m-%Y",
            DateLayout::DayAbbrMonthYear => "%d-%b-%Y",
            DateLayout::Iso => "%Y-%m-%d",
        }
    }
}

/// Immutable descriptor of one bank's statement layout. Column fields hold
/// header names, not indices, so reordered exports keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankFormat {
    pub name: String,
    pub date_column: String,
    pub description_column: String,
    #[serde(default)]
    pub reference_column: Option<String>,
    #[serde(default)]
    pub balance_column: Option<String>,
    pub amount_columns: AmountColumns,
    pub date_layout: DateLayout,
    /// Leading data rows to discard after the header, for banks that put
    /// account metadata above the transaction table.
    #[serde(default)]
    pub skip_rows: usize,
}

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Failed to parse TOML format: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BankFormat {
    pub fn from_toml(toml_content: &str) -> Result<Self, FormatError> {
        Ok(toml::from_str(toml_content)?)
    }

    /// Columns a statement must carry for this format to apply: date,
    /// description, and whichever amount columns the strategy names.
    pub(crate) fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![self.date_column.as_str(), self.description_column.as_str()];
        match &self.amount_columns {
            AmountColumns::DebitCredit { debit, credit } => {
                cols.push(debit);
                cols.push(credit);
            }
            AmountColumns::AmountWithType { amount, type_indicator } => {
                cols.push(amount);
                cols.push(type_indicator);
            }
            AmountColumns::AmountOnly { amount } => cols.push(amount),
        }
        cols
    }
}

/// Ratio of required columns that must be present before a format is
/// considered detected.
const DETECT_THRESHOLD: f64 = 0.7;

/// The bank layouts this system ships with. The generic fallback is not in
/// this list; `detect_format` appends it implicitly.
pub fn builtin_formats() -> Vec<BankFormat> {
    vec![maybank(), cimb(), public_bank(), rhb(), hong_leong()]
}

/// Last-resort layout: ISO dates and a single signed amount column.
pub fn generic() -> BankFormat {
    BankFormat {
        name: "Generic".to_string(),
        date_column: "Date".to_string(),
        description_column: "Description".to_string(),
        reference_column: None,
        balance_column: None,
        amount_columns: AmountColumns::AmountOnly { amount: "Amount".to_string() },
        date_layout: DateLayout::Iso,
        skip_rows: 0,
    }
}

fn maybank() -> BankFormat {
    BankFormat {
        name: "Maybank".to_string(),
        date_column: "Date".to_string(),
        description_column: "Description".to_string(),
        reference_column: Some("Reference".to_string()),
        balance_column: Some("Balance".to_string()),
        amount_columns: AmountColumns::DebitCredit {
            debit: "Debit".to_string(),
            credit: "Credit".to_string(),
        },
        date_layout: DateLayout::DayMonthYearSlash,
        skip_rows: 0,
    }
}

fn cimb() -> BankFormat {
    BankFormat {
        name: "CIMB".to_string(),
        date_column: "Transaction Date".to_string(),
        description_column: "Transaction Description".to_string(),
        reference_column: Some("Reference No".to_string()),
        balance_column: None,
        amount_columns: AmountColumns::AmountWithType {
            amount: "Amount".to_string(),
            type_indicator: "Transaction Type".to_string(),
        },
        date_layout: DateLayout::DayMonthYearDash,
        skip_rows: 0,
    }
}

fn public_bank() -> BankFormat {
    BankFormat {
        name: "Public Bank".to_string(),
        date_column: "Date".to_string(),
        description_column: "Description".to_string(),
        reference_column: None,
        balance_column: Some("Balance".to_string()),
        amount_columns: AmountColumns::AmountOnly { amount: "Amount".to_string() },
        date_layout: DateLayout::DayAbbrMonthYear,
        skip_rows: 0,
    }
}

fn rhb() -> BankFormat {
    BankFormat {
        name: "RHB".to_string(),
        date_column: "Txn Date".to_string(),
        description_column: "Description".to_string(),
        reference_column: Some("Cheque No".to_string()),
        balance_column: Some("Balance".to_string()),
        amount_columns: AmountColumns::DebitCredit {
            debit: "Withdrawal".to_string(),
            credit: "Deposit".to_string(),
        },
        date_layout: DateLayout::DayMonthYearDash,
        skip_rows: 0,
    }
}

fn hong_leong() -> BankFormat {
    BankFormat {
        name: "Hong Leong".to_string(),
        date_column: "Date".to_string(),
        description_column: "Transaction Description".to_string(),
        reference_column: None,
        balance_column: None,
        amount_columns: AmountColumns::AmountWithType {
            amount: "Transaction Amount".to_string(),
            type_indicator: "Dr/Cr".to_string(),
        },
        date_layout: DateLayout::DayMonthYearSlash,
        skip_rows: 0,
    }
}

/// Infer the most likely layout from the statement's header row.
///
/// Header names and required column names match when either contains the
/// other ("Transaction Date" satisfies "Date"). The best-scoring builtin at
/// or above the detection threshold wins, first-seen on ties; anything else
/// falls back to the generic layout. Returns `None` only when the text has
/// no header row at all.
pub fn detect_format(raw_text: &str) -> Option<BankFormat> {
    let headers = header_names(raw_text)?;
    let lowered: Vec<String> = headers
        .iter()
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect();
    if lowered.is_empty() {
        return None;
    }

    let mut best: Option<(BankFormat, f64)> = None;
    for format in builtin_formats() {
        let required = format.required_columns();
        let hits = required
            .iter()
            .filter(|req| {
                let req = req.to_lowercase();
                lowered.iter().any(|h| h.contains(&req) || req.contains(h.as_str()))
            })
            .count();
        let ratio = hits as f64 / required.len() as f64;
        if ratio >= DETECT_THRESHOLD && best.as_ref().is_none_or(|(_, r)| ratio > *r) {
            best = Some((format, ratio));
        }
    }

    Some(best.map(|(format, _)| format).unwrap_or_else(generic))
}

fn header_names(raw_text: &str) -> Option<Vec<String>> {
    let line = raw_text.lines().find(|l| !l.trim().is_empty())?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());
    let record = reader.records().next()?.ok()?;
    Some(record.iter().map(|s| s.trim().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_maybank_from_exact_headers() {
        let text = "Date,Description,Debit,Credit,Balance\n15/01/2024,Salary,,5000.00,8000.00\n";
        let format = detect_format(text).unwrap();
        assert_eq!(format.name, "Maybank");
    }

    #[test]
    fn detects_cimb_from_prefixed_headers() {
        let text = "Transaction Date,Transaction Description,Transaction Type,Amount,Reference No\n";
        let format = detect_format(text).unwrap();
        assert_eq!(format.name, "CIMB");
    }

    #[test]
    fn detection_tolerates_header_variations() {
        // "Txn Date" vs "Date", "Withdrawal"/"Deposit" present: RHB territory.
        let text = "Txn Date,Description,Withdrawal,Deposit,Balance\n";
        let format = detect_format(text).unwrap();
        assert_eq!(format.name, "RHB");
    }

    #[test]
    fn unknown_headers_fall_back_to_generic() {
        let text = "Posted,Narrative,Value\n2024-01-15,Things,12.00\n";
        let format = detect_format(text).unwrap();
        assert_eq!(format.name, "Generic");
    }

    #[test]
    fn empty_text_has_no_format() {
        assert!(detect_format("").is_none());
        assert!(detect_format("\n\n").is_none());
    }

    #[test]
    fn detection_is_idempotent() {
        let text = "Date,Description,Debit,Credit\n";
        let first = detect_format(text).unwrap();
        let second = detect_format(text).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn required_columns_follow_the_amount_strategy() {
        assert_eq!(
            maybank().required_columns(),
            vec!["Date", "Description", "Debit", "Credit"]
        );
        assert_eq!(
            cimb().required_columns(),
            vec![
                "Transaction Date",
                "Transaction Description",
                "Amount",
                "Transaction Type"
            ]
        );
        assert_eq!(generic().required_columns(), vec!["Date", "Description", "Amount"]);
    }

    #[test]
    fn format_from_toml() {
        let toml = r#"
            name = "Custom Bank"
            date_column = "Value Date"
            description_column = "Details"
            date_layout = "iso"
            skip_rows = 2

            [amount_columns]
            strategy = "debit_credit"
            debit = "Out"
            credit = "In"
        "#;
        let format = BankFormat::from_toml(toml).unwrap();
        assert_eq!(format.name, "Custom Bank");
        assert_eq!(format.skip_rows, 2);
        assert_eq!(
            format.amount_columns,
            AmountColumns::DebitCredit { debit: "Out".to_string(), credit: "In".to_string() }
        );
        assert_eq!(format.reference_column, None);
    }

    #[test]
    fn format_from_toml_rejects_garbage() {
        assert!(BankFormat::from_toml("not = valid").is_err());
    }

    #[test]
    fn format_serde_round_trip() {
        let format = maybank();
        let json = serde_json::to_string(&format).unwrap();
        let back: BankFormat = serde_json::from_str(&json).unwrap();
        assert_eq!(back, format);
    }
}
