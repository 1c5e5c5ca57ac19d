//! Ingestion pipeline
//!
//! The single sequential path every judgment set travels: fuse under the
//! current config snapshot, append to the aggregation ring, fan the event out
//! to subscribers, and hand the result to the trend store as a detached task.
//! Fan-out and persistence never delay acceptance of the next input, and no
//! fault on this path halts processing of subsequent events.

use crate::aggregate::{AggregationBuffer, BufferStats, DEFAULT_SUMMARY_WINDOW};
use crate::config::ConfigStore;
use crate::fusion::{self, ModalityAgreement};
use crate::hub::{HubStats, SentimentHub, Subscriber, DEFAULT_QUEUE_CAPACITY};
use crate::trend::{TrendRange, TrendStore};
use chrono::{Duration as ChronoDuration, Utc};
use sentimux_common::events::{BreakdownEntry, EventSummary, SentimentEvent};
use sentimux_common::types::{FusionResult, ModalityJudgment, WindowSummary};
use sentimux_common::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Pipeline sizing knobs
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Aggregation ring capacity
    pub buffer_capacity: usize,
    /// Window used for the summary attached to each broadcast event
    pub summary_window: usize,
    /// Per-subscriber outbound queue capacity
    pub subscriber_queue_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: crate::aggregate::DEFAULT_CAPACITY,
            summary_window: DEFAULT_SUMMARY_WINDOW,
            subscriber_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// The wired fusion pipeline
///
/// Constructed explicitly at startup and shared as one process-wide instance;
/// all dependencies are injected, nothing is a hidden global.
pub struct Pipeline {
    config: Arc<ConfigStore>,
    buffer: Arc<AggregationBuffer>,
    hub: Arc<SentimentHub>,
    trend: Option<Arc<TrendStore>>,
    summary_window: usize,
}

impl Pipeline {
    pub fn new(
        config: Arc<ConfigStore>,
        options: PipelineOptions,
        trend: Option<Arc<TrendStore>>,
    ) -> Self {
        Self {
            config,
            buffer: Arc::new(AggregationBuffer::new(options.buffer_capacity)),
            hub: Arc::new(SentimentHub::with_queue_capacity(
                options.subscriber_queue_capacity,
            )),
            trend,
            summary_window: options.summary_window.max(1),
        }
    }

    /// Carry one judgment set through fuse -> aggregate -> broadcast -> trend
    ///
    /// Synchronous up to the broadcast enqueue; the trend write detaches as
    /// its own task so a slow database cannot stall ingestion. Must run
    /// inside a tokio runtime when a trend store is attached.
    pub fn ingest(&self, judgments: &[ModalityJudgment]) -> FusionResult {
        let snapshot = self.config.current();
        let result = fusion::predict(judgments, &snapshot);

        self.buffer.append(result.clone());

        let summary = self.buffer.summary(self.summary_window);
        self.hub.publish(&Self::update_event(&result, &summary));

        if let Some(trend) = &self.trend {
            let trend = Arc::clone(trend);
            let for_trend = result.clone();
            // Detached on purpose; shutdown does not await in-flight writes
            tokio::spawn(async move {
                trend.record(&for_trend).await;
            });
        }

        result
    }

    fn update_event(result: &FusionResult, summary: &WindowSummary) -> SentimentEvent {
        let modality_breakdown: BTreeMap<String, BreakdownEntry> = result
            .modality_breakdown
            .iter()
            .map(|(modality, contribution)| {
                (
                    modality.clone(),
                    BreakdownEntry {
                        weight: contribution.weight,
                        confidence: contribution.confidence,
                    },
                )
            })
            .collect();

        SentimentEvent::SentimentUpdate {
            label: result.label,
            confidence: result.confidence,
            modality_breakdown,
            summary: EventSummary::from(summary),
        }
    }

    /// Register a live subscriber
    pub fn subscribe(&self) -> Subscriber {
        self.hub.subscribe()
    }

    /// Remove a subscriber; idempotent
    pub fn unsubscribe(&self, id: Uuid) {
        self.hub.unsubscribe(id);
    }

    /// Rolling summary over the recent window
    pub fn summary(&self) -> WindowSummary {
        self.buffer.summary(self.summary_window)
    }

    /// Hourly trend buckets covering the last `hours` hours
    pub async fn trend(&self, hours: u32) -> Result<TrendRange> {
        let trend = self
            .trend
            .as_ref()
            .ok_or_else(|| Error::Persistence("trend store not configured".to_string()))?;
        let to = Utc::now();
        let from = to - ChronoDuration::hours(hours as i64);
        trend.query_range(from, to).await
    }

    /// Pairwise modality agreement over the most recent `last_k` results
    pub fn modality_agreement(&self, last_k: usize) -> Vec<ModalityAgreement> {
        fusion::modality_agreement(&self.buffer.recent(last_k))
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn hub(&self) -> &Arc<SentimentHub> {
        &self.hub
    }

    pub fn hub_stats(&self) -> HubStats {
        self.hub.stats()
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.buffer.stats()
    }
}
