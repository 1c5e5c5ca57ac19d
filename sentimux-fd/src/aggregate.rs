//! Bounded aggregation of recent fusion results
//!
//! Fixed-capacity ring of the most recent results plus rolling summary
//! statistics. Single writer (the ingestion pipeline), many concurrent
//! readers. One mutex, scoped to the mutation/snapshot-copy step only;
//! summary computation runs on a copied slice so readers never hold the lock
//! while crunching.

use sentimux_common::types::{FusionResult, WindowSummary};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::trace;

/// Default ring capacity
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default summary window (most recent K results)
pub const DEFAULT_SUMMARY_WINDOW: usize = 100;

/// Buffer statistics
#[derive(Debug, Clone, Copy)]
pub struct BufferStats {
    /// Current number of buffered results
    pub len: usize,
    /// Fixed capacity
    pub capacity: usize,
    /// Total results evicted FIFO since startup
    pub evictions: u64,
}

struct Inner {
    ring: VecDeque<FusionResult>,
    evictions: u64,
}

/// Fixed-capacity ring buffer of fusion results
pub struct AggregationBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl AggregationBuffer {
    /// Create a buffer with the given capacity (min 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                ring: VecDeque::with_capacity(capacity),
                evictions: 0,
            }),
            capacity,
        }
    }

    /// O(1) append; evicts the oldest entry when full
    pub fn append(&self, result: FusionResult) {
        let mut inner = self.inner.lock().unwrap();
        if inner.ring.len() == self.capacity {
            inner.ring.pop_front();
            inner.evictions += 1;
            trace!("Aggregation ring full, evicted oldest (total {})", inner.evictions);
        }
        inner.ring.push_back(result);
    }

    /// Summary over the most recent `min(last_k, len)` results
    pub fn summary(&self, last_k: usize) -> WindowSummary {
        let window = self.recent(last_k);

        let mut summary = WindowSummary::default();
        if window.is_empty() {
            return summary;
        }

        let mut confidence_sum = 0.0;
        for result in &window {
            confidence_sum += result.confidence;
            *summary
                .label_distribution
                .entry(result.label.as_str().to_string())
                .or_insert(0) += 1;
            for modality in result.modality_breakdown.keys() {
                *summary
                    .modality_distribution
                    .entry(modality.clone())
                    .or_insert(0) += 1;
            }
        }
        summary.count = window.len() as u64;
        summary.avg_confidence = confidence_sum / window.len() as f64;
        summary
    }

    /// Copy of the most recent `min(k, len)` results, oldest-first
    ///
    /// The lock is held only for the copy.
    pub fn recent(&self, k: usize) -> Vec<FusionResult> {
        let inner = self.inner.lock().unwrap();
        let len = inner.ring.len();
        let take = k.min(len);
        inner.ring.iter().skip(len - take).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.inner.lock().unwrap();
        BufferStats {
            len: inner.ring.len(),
            capacity: self.capacity,
            evictions: inner.evictions,
        }
    }
}

impl Default for AggregationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sentimux_common::types::{ModalityContribution, SentimentLabel};
    use std::collections::BTreeMap;

    fn result(label: SentimentLabel, confidence: f64) -> FusionResult {
        FusionResult {
            label,
            confidence,
            modality_breakdown: BTreeMap::from([(
                "text".to_string(),
                ModalityContribution {
                    label,
                    confidence,
                    weight: 1.0,
                    contribution: confidence,
                },
            )]),
            consensus_level: 1.0,
            agreement_bonus_applied: 0.0,
            conflict: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_append_within_capacity() {
        let buffer = AggregationBuffer::new(10);
        for _ in 0..5 {
            buffer.append(result(SentimentLabel::Positive, 0.8));
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.stats().evictions, 0);
    }

    #[test]
    fn test_overflow_evicts_oldest_fifo() {
        // Insert N+k items into a capacity-N buffer: length stays N and the
        // survivors are the N most recent, oldest-first evicted.
        let buffer = AggregationBuffer::new(4);
        for i in 0..7 {
            buffer.append(result(SentimentLabel::Positive, i as f64 / 10.0));
        }
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.stats().evictions, 3);

        let kept = buffer.recent(10);
        let confidences: Vec<f64> = kept.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn test_summary_over_window() {
        let buffer = AggregationBuffer::new(100);
        buffer.append(result(SentimentLabel::Positive, 0.9));
        buffer.append(result(SentimentLabel::Positive, 0.7));
        buffer.append(result(SentimentLabel::Negative, 0.5));

        let summary = buffer.summary(100);
        assert_eq!(summary.count, 3);
        assert!((summary.avg_confidence - 0.7).abs() < 1e-9);
        assert_eq!(summary.label_distribution["positive"], 2);
        assert_eq!(summary.label_distribution["negative"], 1);
        assert_eq!(summary.modality_distribution["text"], 3);
    }

    #[test]
    fn test_summary_respects_last_k() {
        let buffer = AggregationBuffer::new(100);
        buffer.append(result(SentimentLabel::Negative, 0.2));
        buffer.append(result(SentimentLabel::Positive, 0.8));
        buffer.append(result(SentimentLabel::Positive, 0.6));

        // Only the two most recent
        let summary = buffer.summary(2);
        assert_eq!(summary.count, 2);
        assert!((summary.avg_confidence - 0.7).abs() < 1e-9);
        assert!(!summary.label_distribution.contains_key("negative"));
    }

    #[test]
    fn test_empty_summary() {
        let buffer = AggregationBuffer::new(10);
        let summary = buffer.summary(100);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.avg_confidence, 0.0);
        assert!(summary.label_distribution.is_empty());
    }
}
