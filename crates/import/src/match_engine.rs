use std::collections::BTreeSet;

use concilia_core::{DateRange, MatchCandidate, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::statement::ImportedTransaction;
use crate::util::similarity;

pub const DEFAULT_DATE_BUFFER_DAYS: i64 = 30;

/// Thresholds and weights for the scoring engine. Always passed explicitly
/// so concurrent runs with different tenant tuning cannot interfere; the
/// defaults are the documented production values. Weights conventionally
/// sum to 100 but the engine normalizes against their actual sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub auto_match_threshold: f64,
    pub suggestion_threshold: f64,
    pub amount_tolerance: Money,
    pub date_tolerance_days: i64,
    pub amount_weight: f64,
    pub date_weight: f64,
    pub reference_weight: f64,
    pub description_weight: f64,
    pub description_similarity_cutoff: f64,
    /// When false, description scoring degrades to bag-of-words keyword
    /// overlap instead of edit-distance similarity.
    pub fuzzy_description: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            auto_match_threshold: 90.0,
            suggestion_threshold: 70.0,
            amount_tolerance: Money::from_cents(1),
            date_tolerance_days: 7,
            amount_weight: 40.0,
            date_weight: 20.0,
            reference_weight: 25.0,
            description_weight: 15.0,
            description_similarity_cutoff: 0.6,
            fuzzy_description: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl MatchingConfig {
    /// Loads a config from TOML; omitted fields keep their defaults.
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    /// Tier for an already-selected match. Anything below the suggestion
    /// threshold never becomes a match, so there is no third tier here.
    pub fn classify(&self, confidence: f64) -> MatchTier {
        if confidence >= self.auto_match_threshold {
            MatchTier::Automatic
        } else {
            MatchTier::Suggested
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchTier {
    Automatic,
    Suggested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub transaction_id: String,
    pub candidate: MatchCandidate,
    /// Always in [0, 100], two decimal places, produced only by
    /// `score_match`'s weighted formula.
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub amount_difference: Money,
    pub date_difference_days: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub total: usize,
    pub auto_matched: usize,
    pub suggested: usize,
    pub unmatched: usize,
    /// Mean confidence across produced matches, two decimals, 0 when none.
    pub average_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoMatchOutcome {
    pub matches: Vec<MatchResult>,
    pub unmatched: Vec<ImportedTransaction>,
    pub summary: MatchSummary,
}

/// Score one transaction against one candidate. Every weight contributes
/// to the maximum achievable total whether or not its sub-score fires, and
/// confidence is the fired total over that maximum, scaled to [0, 100].
pub fn score_match(
    tx: &ImportedTransaction,
    candidate: &MatchCandidate,
    config: &MatchingConfig,
) -> MatchResult {
    let mut total = 0.0;
    let mut max_possible = 0.0;
    let mut reasons = Vec::new();

    // Amount: exact within tolerance, then 1% and 5% relative bands.
    let amount_difference = tx.amount().abs_diff(candidate.amount);
    max_possible += config.amount_weight;
    if amount_difference <= config.amount_tolerance {
        total += config.amount_weight;
        reasons.push("Exact amount match".to_string());
    } else {
        let diff = amount_difference.to_decimal();
        let base = candidate.amount.to_decimal();
        if diff <= base * Decimal::new(1, 2) {
            total += config.amount_weight * 0.8;
            reasons.push("Amount within 1%".to_string());
        } else if diff <= base * Decimal::new(5, 2) {
            total += config.amount_weight * 0.5;
            reasons.push("Amount within 5%".to_string());
        }
    }

    // Date proximity: full marks within a day, linear decay to the edge of
    // the tolerance window.
    let date_difference_days = (tx.date - candidate.date).num_days().abs();
    max_possible += config.date_weight;
    if date_difference_days <= 1 {
        total += config.date_weight;
        reasons.push("Date within 1 day".to_string());
    } else if date_difference_days <= config.date_tolerance_days {
        let decay = 1.0 - date_difference_days as f64 / config.date_tolerance_days as f64;
        total += config.date_weight * decay;
        reasons.push(format!("Within {date_difference_days} days"));
    }

    // Reference: exact beats containment; with no candidate reference the
    // document number stands in.
    max_possible += config.reference_weight;
    let tx_ref = tx
        .reference
        .as_deref()
        .map(str::to_lowercase)
        .filter(|r| !r.is_empty());
    if let Some(tx_ref) = tx_ref {
        let cand_ref = candidate
            .reference
            .as_deref()
            .map(str::to_lowercase)
            .filter(|r| !r.is_empty());
        match cand_ref {
            Some(cand_ref) if tx_ref == cand_ref => {
                total += config.reference_weight;
                reasons.push("Exact reference match".to_string());
            }
            Some(cand_ref) if tx_ref.contains(&cand_ref) || cand_ref.contains(&tx_ref) => {
                total += config.reference_weight * 0.7;
                reasons.push("Partial reference match".to_string());
            }
            Some(_) => {}
            None => {
                let number = candidate.number.to_lowercase();
                if !number.is_empty() && (tx_ref.contains(&number) || number.contains(&tx_ref)) {
                    total += config.reference_weight * 0.8;
                    reasons.push("Reference matches document number".to_string());
                }
            }
        }
    }

    // Description: edit-distance similarity, or keyword overlap when fuzzy
    // matching is switched off.
    max_possible += config.description_weight;
    let tx_desc = tx.description.to_lowercase();
    let cand_desc = candidate.description.to_lowercase();
    if config.fuzzy_description {
        let score = similarity(&tx_desc, &cand_desc);
        if score >= config.description_similarity_cutoff {
            total += config.description_weight * score;
            reasons.push(format!("Description similarity: {:.0}%", score * 100.0));
        }
    } else {
        let overlap = keyword_overlap(&tx_desc, &cand_desc);
        if overlap > 0.0 {
            total += config.description_weight * overlap;
            reasons.push("Shared description keywords".to_string());
        }
    }

    let confidence = if max_possible > 0.0 {
        round2(total / max_possible * 100.0)
    } else {
        0.0
    };

    MatchResult {
        transaction_id: tx.transaction_id(),
        candidate: candidate.clone(),
        confidence,
        reasons,
        amount_difference,
        date_difference_days,
    }
}

/// Shared words longer than three characters over the larger word count.
fn keyword_overlap(a: &str, b: &str) -> f64 {
    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();
    let max_words = words_a.len().max(words_b.len());
    if max_words == 0 {
        return 0.0;
    }
    let keywords: BTreeSet<&str> = words_a.iter().copied().filter(|w| w.len() > 3).collect();
    let shared: BTreeSet<&str> = words_b
        .iter()
        .copied()
        .filter(|w| w.len() > 3 && keywords.contains(w))
        .collect();
    shared.len() as f64 / max_words as f64
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Reconcile every transaction against the direction-compatible candidates.
/// Each transaction keeps its single best-scoring candidate if that score
/// clears the suggestion threshold; everything else lands in `unmatched`.
/// Output order follows input transaction order.
pub fn auto_match(
    transactions: &[ImportedTransaction],
    candidates: &[MatchCandidate],
    config: &MatchingConfig,
) -> AutoMatchOutcome {
    let mut matches = Vec::new();
    let mut unmatched = Vec::new();

    for tx in transactions {
        match find_best_match(tx, candidates, config) {
            Some(result) if result.confidence >= config.suggestion_threshold => {
                matches.push(result)
            }
            _ => unmatched.push(tx.clone()),
        }
    }

    let summary = summarize(&matches, transactions.len(), unmatched.len(), config);
    tracing::debug!(
        total = summary.total,
        auto = summary.auto_matched,
        suggested = summary.suggested,
        unmatched = summary.unmatched,
        "auto-match pass complete"
    );
    AutoMatchOutcome { matches, unmatched, summary }
}

/// Best candidate under a strict `>` comparison; the first candidate seen
/// keeps the slot on an exact tie. Direction is a hard filter, not a
/// scored factor: an outgoing transaction only ever sees payments and
/// bills, an incoming one only receipts and invoices.
pub fn find_best_match(
    tx: &ImportedTransaction,
    candidates: &[MatchCandidate],
    config: &MatchingConfig,
) -> Option<MatchResult> {
    let mut best: Option<MatchResult> = None;
    for candidate in candidates {
        if candidate.is_outgoing() != tx.is_outgoing() {
            continue;
        }
        let result = score_match(tx, candidate, config);
        match &best {
            Some(current) if result.confidence <= current.confidence => {}
            _ => best = Some(result),
        }
    }
    best
}

fn summarize(
    matches: &[MatchResult],
    total: usize,
    unmatched: usize,
    config: &MatchingConfig,
) -> MatchSummary {
    let auto_matched = matches
        .iter()
        .filter(|m| config.classify(m.confidence) == MatchTier::Automatic)
        .count();
    let average_confidence = if matches.is_empty() {
        0.0
    } else {
        round2(matches.iter().map(|m| m.confidence).sum::<f64>() / matches.len() as f64)
    };
    MatchSummary {
        total,
        auto_matched,
        suggested: matches.len() - auto_matched,
        unmatched,
        average_confidence,
    }
}

/// Splits produced matches into (automatic, suggested) by the config's
/// auto-match threshold.
pub fn group_by_tier<'a>(
    matches: &'a [MatchResult],
    config: &MatchingConfig,
) -> (Vec<&'a MatchResult>, Vec<&'a MatchResult>) {
    matches
        .iter()
        .partition(|m| config.classify(m.confidence) == MatchTier::Automatic)
}

/// Pre-filter for large candidate sets: keep only candidates dated inside
/// the statement period widened by `buffer_days` on each side.
pub fn filter_candidates_by_date_range(
    candidates: &[MatchCandidate],
    period: &DateRange,
    buffer_days: i64,
) -> Vec<MatchCandidate> {
    let window = period.expand(buffer_days);
    candidates
        .iter()
        .filter(|c| window.contains(c.date))
        .cloned()
        .collect()
}
