//! Pairwise modality agreement
//!
//! Answers "how often do two channels vote the same way" over a set of
//! recent fusion results, using the per-modality labels carried in each
//! result's breakdown.

use sentimux_common::types::FusionResult;
use std::collections::BTreeMap;

/// Agreement score for one modality pair
#[derive(Debug, Clone, PartialEq)]
pub struct ModalityAgreement {
    pub modality_a: String,
    pub modality_b: String,
    /// Fraction of co-occurrences where both voted the same label, in [0,1]
    pub agreement: f64,
    /// Number of results where both modalities were present
    pub samples: u64,
}

/// Compute pairwise agreement scores between modalities over a result set
///
/// Pairs are emitted in lexicographic order (a < b). Pairs that never
/// co-occur are omitted.
pub fn modality_agreement(results: &[FusionResult]) -> Vec<ModalityAgreement> {
    // (matches, co-occurrences) per ordered pair
    let mut tally: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();

    for result in results {
        let entries: Vec<_> = result.modality_breakdown.iter().collect();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let (name_a, contrib_a) = entries[i];
                let (name_b, contrib_b) = entries[j];
                let key = (name_a.clone(), name_b.clone());
                let entry = tally.entry(key).or_insert((0, 0));
                entry.1 += 1;
                if contrib_a.label == contrib_b.label {
                    entry.0 += 1;
                }
            }
        }
    }

    tally
        .into_iter()
        .map(|((modality_a, modality_b), (matches, samples))| ModalityAgreement {
            modality_a,
            modality_b,
            agreement: matches as f64 / samples as f64,
            samples,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionConfig;
    use crate::fusion::predict;
    use sentimux_common::types::{ModalityJudgment, SentimentLabel};

    fn result_for(labels: &[(&str, SentimentLabel)]) -> FusionResult {
        let judgments: Vec<_> = labels
            .iter()
            .map(|(m, l)| ModalityJudgment::new(*m, *l, 0.8))
            .collect();
        predict(&judgments, &FusionConfig::builtin_default())
    }

    #[test]
    fn test_full_agreement() {
        let results = vec![
            result_for(&[("audio", SentimentLabel::Positive), ("text", SentimentLabel::Positive)]),
            result_for(&[("audio", SentimentLabel::Negative), ("text", SentimentLabel::Negative)]),
        ];
        let scores = modality_agreement(&results);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].modality_a, "audio");
        assert_eq!(scores[0].modality_b, "text");
        assert_eq!(scores[0].agreement, 1.0);
        assert_eq!(scores[0].samples, 2);
    }

    #[test]
    fn test_partial_agreement() {
        let results = vec![
            result_for(&[("audio", SentimentLabel::Positive), ("text", SentimentLabel::Positive)]),
            result_for(&[("audio", SentimentLabel::Negative), ("text", SentimentLabel::Positive)]),
        ];
        let scores = modality_agreement(&results);
        assert_eq!(scores[0].agreement, 0.5);
    }

    #[test]
    fn test_pairs_that_never_cooccur_are_omitted() {
        let results = vec![
            result_for(&[("audio", SentimentLabel::Positive)]),
            result_for(&[("text", SentimentLabel::Positive)]),
        ];
        assert!(modality_agreement(&results).is_empty());
    }

    #[test]
    fn test_three_modalities_yield_three_pairs() {
        let results = vec![result_for(&[
            ("audio", SentimentLabel::Positive),
            ("text", SentimentLabel::Positive),
            ("video", SentimentLabel::Negative),
        ])];
        let scores = modality_agreement(&results);
        assert_eq!(scores.len(), 3);
        let pair = |a: &str, b: &str| {
            scores
                .iter()
                .find(|s| s.modality_a == a && s.modality_b == b)
                .unwrap()
                .agreement
        };
        assert_eq!(pair("audio", "text"), 1.0);
        assert_eq!(pair("audio", "video"), 0.0);
        assert_eq!(pair("text", "video"), 0.0);
    }
}
