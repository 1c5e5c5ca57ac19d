//! Sentiment data model
//!
//! Core types shared by the fusion engine, aggregation buffer, broadcast hub,
//! and trend store. All types are plain data; `FusionResult` is immutable once
//! produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical sentiment label
///
/// Exactly three values exist. Ordering for tie-breaks is deterministic:
/// Positive > Neutral > Negative (see [`SentimentLabel::tie_break_rank`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// All labels in tie-break priority order (highest priority first)
    pub const ALL: [SentimentLabel; 3] = [
        SentimentLabel::Positive,
        SentimentLabel::Neutral,
        SentimentLabel::Negative,
    ];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }

    /// Parse from string, case-insensitive
    ///
    /// Returns None for anything outside the three canonical values.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "positive" => Some(SentimentLabel::Positive),
            "negative" => Some(SentimentLabel::Negative),
            "neutral" => Some(SentimentLabel::Neutral),
            _ => None,
        }
    }

    /// Tie-break rank: lower wins when weighted scores are equal
    ///
    /// Positive (0) > Neutral (1) > Negative (2).
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            SentimentLabel::Positive => 0,
            SentimentLabel::Neutral => 1,
            SentimentLabel::Negative => 2,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sentiment judgment from one input channel
///
/// Produced by external per-modality classifiers; this crate never scores
/// content itself. Confidence is clamped into [0,1] at the point of use
/// rather than rejected, so malformed values never surface as faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityJudgment {
    /// Input channel name (e.g., "text", "audio", "video")
    pub modality: String,
    /// The channel's sentiment verdict
    pub label: SentimentLabel,
    /// Confidence in [0,1]; out-of-range values are clamped, not rejected
    pub confidence: f64,
}

impl ModalityJudgment {
    pub fn new(modality: impl Into<String>, label: SentimentLabel, confidence: f64) -> Self {
        Self {
            modality: modality.into(),
            label,
            confidence,
        }
    }

    /// Confidence clamped into [0,1]; NaN maps to 0.0
    pub fn clamped_confidence(&self) -> f64 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }
}

/// Per-modality diagnostic detail for one fused decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalityContribution {
    /// Label this modality voted for
    pub label: SentimentLabel,
    /// Clamped input confidence
    pub confidence: f64,
    /// Normalized dynamic weight (all contributions sum to 1)
    pub weight: f64,
    /// confidence * weight, the modality's share of its label's score
    pub contribution: f64,
}

/// The fused decision over one judgment set
///
/// Immutable once produced. `predict()` with identical inputs and config
/// snapshot always yields an identical result (timestamps aside).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResult {
    /// Winning label
    pub label: SentimentLabel,
    /// Winning label's normalized weighted score plus agreement bonus, in [0,1]
    pub confidence: f64,
    /// Per-modality weights and contributions (diagnostics + agreement queries)
    pub modality_breakdown: BTreeMap<String, ModalityContribution>,
    /// Degree of cross-modality agreement on the winner: 1.0 unanimous,
    /// 0.0 for a full split (e.g., 1-1 over two labels)
    pub consensus_level: f64,
    /// Agreement bonus that was added to confidence (0.0, 0.05, or 0.10)
    pub agreement_bonus_applied: f64,
    /// True when two or more distinct labels each carried a high-confidence judgment
    pub conflict: bool,
    /// When the fusion was computed
    pub timestamp: DateTime<Utc>,
}

impl FusionResult {
    /// The neutral default returned for an empty judgment set
    pub fn neutral_default(timestamp: DateTime<Utc>) -> Self {
        Self {
            label: SentimentLabel::Neutral,
            confidence: 0.0,
            modality_breakdown: BTreeMap::new(),
            consensus_level: 0.0,
            agreement_bonus_applied: 0.0,
            conflict: false,
            timestamp,
        }
    }
}

/// Rolling summary over the most recent window of fusion results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowSummary {
    /// Number of results summarized
    pub count: u64,
    /// Mean fused confidence over the window
    pub avg_confidence: f64,
    /// Result count per winning label
    pub label_distribution: BTreeMap<String, u64>,
    /// Judgment count per contributing modality
    pub modality_distribution: BTreeMap<String, u64>,
}
