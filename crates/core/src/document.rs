use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::money::Money;

/// The documentary counterparts a bank transaction can settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Payment,
    Receipt,
    Bill,
    Invoice,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Payment => write!(f, "Payment"),
            DocumentKind::Receipt => write!(f, "Receipt"),
            DocumentKind::Bill => write!(f, "Bill"),
            DocumentKind::Invoice => write!(f, "Invoice"),
        }
    }
}

impl DocumentKind {
    /// Payments and bills settle money leaving the account; receipts and
    /// invoices settle money coming in.
    pub fn is_outgoing(self) -> bool {
        matches!(self, DocumentKind::Payment | DocumentKind::Bill)
    }
}

/// A document eligible for reconciliation. Candidates are supplied by the
/// caller and never created or mutated here; `amount` is always positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub kind: DocumentKind,
    pub id: String,
    pub number: String,
    pub date: NaiveDate,
    pub amount: Money,
    pub description: String,
    pub counterparty_id: Option<String>,
    pub reference: Option<String>,
}

impl MatchCandidate {
    pub fn is_outgoing(&self) -> bool {
        self.kind.is_outgoing()
    }
}
