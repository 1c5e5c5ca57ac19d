//! Fusion prediction
//!
//! Combines per-modality judgments into one decision:
//!
//! 1. Empty input returns the neutral default.
//! 2. Each judgment gets a dynamic weight from its configured base weight,
//!    scaled up above the confidence threshold and down below 0.5 confidence
//!    (floored at 10% of base). Unknown modalities start from base weight 1.0.
//! 3. Under the adaptive method, unanimous judgment sets get a uniform
//!    additive consensus boost before normalization.
//! 4. Weights are normalized to sum 1; each label's score is the sum of
//!    `confidence * weight` over its judgments.
//! 5. Highest score wins; equal scores resolve positive > neutral > negative.
//! 6. The winner's score gains the agreement bonus (unanimous +0.10, strict
//!    majority +0.05), capped at 1.0.
//!
//! Malformed confidences are clamped into [0,1], never rejected; this
//! function has no failure path for well-typed input.

use super::{MAJORITY_BONUS, MIN_WEIGHT_FRACTION, UNANIMOUS_BONUS};
use crate::config::{FusionConfig, FusionMethod};
use chrono::Utc;
use sentimux_common::types::{
    FusionResult, ModalityContribution, ModalityJudgment, SentimentLabel,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Diagnostic detail alongside a prediction
#[derive(Debug, Clone)]
pub struct FusionDetail {
    /// Weighted score per label, after weight normalization
    pub label_scores: BTreeMap<SentimentLabel, f64>,
    /// Dynamic weight per judgment index, before normalization
    pub raw_weights: Vec<f64>,
    /// Whether the unanimous consensus boost was applied
    pub consensus_boost_applied: bool,
}

/// Fuse a judgment set into one decision under the given snapshot
pub fn predict(judgments: &[ModalityJudgment], config: &FusionConfig) -> FusionResult {
    predict_with_detail(judgments, config).0
}

/// Fuse with per-label score and raw-weight diagnostics
///
/// Same computation as [`predict`]; the detail is derived from the identical
/// intermediate values, so the pair is as pure as the plain call.
pub fn predict_with_detail(
    judgments: &[ModalityJudgment],
    config: &FusionConfig,
) -> (FusionResult, FusionDetail) {
    let timestamp = Utc::now();

    if judgments.is_empty() {
        debug!("Empty judgment set, returning neutral default");
        return (
            FusionResult::neutral_default(timestamp),
            FusionDetail {
                label_scores: BTreeMap::new(),
                raw_weights: Vec::new(),
                consensus_boost_applied: false,
            },
        );
    }

    let n = judgments.len();
    let unanimous = judgments.iter().all(|j| j.label == judgments[0].label);

    // Dynamic per-judgment weights
    let mut weights: Vec<f64> = judgments
        .iter()
        .map(|j| dynamic_weight(j, config))
        .collect();

    let boost_applied = config.method == FusionMethod::Adaptive && unanimous;
    if boost_applied {
        for w in weights.iter_mut() {
            *w += config.consensus_boost;
        }
    }

    let raw_weights = weights.clone();

    // Normalize to sum 1
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    } else {
        let uniform = 1.0 / n as f64;
        for w in weights.iter_mut() {
            *w = uniform;
        }
    }

    // Per-label weighted scores and per-modality breakdown
    let mut label_scores: BTreeMap<SentimentLabel, f64> = BTreeMap::new();
    let mut breakdown: BTreeMap<String, ModalityContribution> = BTreeMap::new();
    for (j, &w) in judgments.iter().zip(weights.iter()) {
        let confidence = j.clamped_confidence();
        let contribution = confidence * w;
        *label_scores.entry(j.label).or_insert(0.0) += contribution;
        breakdown.insert(
            j.modality.clone(),
            ModalityContribution {
                label: j.label,
                confidence,
                weight: w,
                contribution,
            },
        );
    }

    // Winner by score; equal scores resolve positive > neutral > negative
    let winner = SentimentLabel::ALL
        .iter()
        .copied()
        .max_by(|a, b| {
            let sa = label_scores.get(a).copied().unwrap_or(0.0);
            let sb = label_scores.get(b).copied().unwrap_or(0.0);
            sa.partial_cmp(&sb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.tie_break_rank().cmp(&a.tie_break_rank()))
        })
        .unwrap_or(SentimentLabel::Neutral);

    let winner_count = judgments.iter().filter(|j| j.label == winner).count();

    let agreement_bonus = if unanimous {
        UNANIMOUS_BONUS
    } else if winner_count as f64 > n as f64 / 2.0 {
        MAJORITY_BONUS
    } else {
        0.0
    };

    let winning_score = label_scores.get(&winner).copied().unwrap_or(0.0);
    let confidence = (winning_score + agreement_bonus).min(1.0);

    let consensus_level = if n <= 1 {
        1.0
    } else {
        (winner_count as f64 - 1.0) / (n as f64 - 1.0)
    };

    // Two distinct labels each backed by a high-confidence judgment
    let mut confident_labels: Vec<SentimentLabel> = judgments
        .iter()
        .filter(|j| j.clamped_confidence() >= config.confidence_threshold)
        .map(|j| j.label)
        .collect();
    confident_labels.sort();
    confident_labels.dedup();
    let conflict = confident_labels.len() >= 2;

    if conflict {
        warn!(
            "Modality conflict: {} labels with confidence >= {:.2}",
            confident_labels.len(),
            config.confidence_threshold
        );
    }

    let result = FusionResult {
        label: winner,
        confidence,
        modality_breakdown: breakdown,
        consensus_level,
        agreement_bonus_applied: agreement_bonus,
        conflict,
        timestamp,
    };

    let detail = FusionDetail {
        label_scores,
        raw_weights,
        consensus_boost_applied: boost_applied,
    };

    (result, detail)
}

/// Dynamic weight for one judgment
///
/// Above the confidence threshold the base weight scales up proportionally to
/// the excess; below 0.5 confidence it scales down proportionally to the
/// deficit (tempered by `uncertainty_penalty`), floored at 10% of base. The
/// simple method skips scaling entirely.
fn dynamic_weight(judgment: &ModalityJudgment, config: &FusionConfig) -> f64 {
    let base = config.base_weight(&judgment.modality);
    if config.method == FusionMethod::Simple {
        return base;
    }

    let confidence = judgment.clamped_confidence();
    if confidence > config.confidence_threshold {
        base * (1.0 + (confidence - config.confidence_threshold))
    } else if confidence < 0.5 {
        let scaled = base * (1.0 - config.uncertainty_penalty * (0.5 - confidence) / 0.5);
        scaled.max(base * MIN_WEIGHT_FRACTION)
    } else {
        base
    }
}
