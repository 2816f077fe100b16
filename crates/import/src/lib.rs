pub mod format;
pub mod match_engine;
pub mod statement;
pub mod validate;
pub(crate) mod util;

pub use format::{AmountColumns, BankFormat, DateLayout, FormatError};
pub use match_engine::{
    AutoMatchOutcome, ConfigError, MatchResult, MatchSummary, MatchTier, MatchingConfig,
    DEFAULT_DATE_BUFFER_DAYS,
};
pub use statement::{ImportResult, ImportSummary, ImportedTransaction};
pub use validate::MatchValidation;

pub mod reconcile {
    use crate::*;
    use concilia_core::{DateRange, MatchCandidate};

    pub fn import_statement(
        raw_text: &str,
        format: &BankFormat,
        account_id: &str,
        batch_id: &str,
    ) -> ImportResult {
        crate::statement::import_statement(raw_text, format, account_id, batch_id)
    }

    pub fn detect_format(raw_text: &str) -> Option<BankFormat> {
        crate::format::detect_format(raw_text)
    }

    /// Match with per-call config; `None` uses the documented defaults.
    pub fn auto_match(
        transactions: &[ImportedTransaction],
        candidates: &[MatchCandidate],
        config: Option<MatchingConfig>,
    ) -> AutoMatchOutcome {
        let config = config.unwrap_or_default();
        crate::match_engine::auto_match(transactions, candidates, &config)
    }

    pub fn filter_candidates_by_date_range(
        candidates: &[MatchCandidate],
        period: &DateRange,
        buffer_days: i64,
    ) -> Vec<MatchCandidate> {
        crate::match_engine::filter_candidates_by_date_range(candidates, period, buffer_days)
    }

    pub fn group_by_tier<'a>(
        matches: &'a [MatchResult],
        config: &MatchingConfig,
    ) -> (Vec<&'a MatchResult>, Vec<&'a MatchResult>) {
        crate::match_engine::group_by_tier(matches, config)
    }

    pub fn validate_match(
        tx: &ImportedTransaction,
        candidate: &MatchCandidate,
    ) -> MatchValidation {
        crate::validate::validate_match(tx, candidate)
    }
}
