//! Event types for the SENTIMUX broadcast hub
//!
//! Events are fanned out to live subscribers on every fused result and can be
//! serialized for transmission over whatever delivery channel the embedding
//! application provides. The wire shape of `SentimentUpdate` is the external
//! subscriber contract.

use crate::types::{SentimentLabel, WindowSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One modality's entry in the subscriber-facing breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    /// Normalized dynamic weight this modality carried
    pub weight: f64,
    /// Clamped input confidence
    pub confidence: f64,
}

/// SENTIMUX event types
///
/// Broadcast to every active subscriber in publish order. Serialized with a
/// `type` tag so consumers can dispatch without deserializing the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SentimentEvent {
    /// A new fused decision, with the rolling window summary at publish time
    SentimentUpdate {
        /// Winning label
        label: SentimentLabel,
        /// Fused confidence in [0,1]
        confidence: f64,
        /// Per-modality weight and confidence
        modality_breakdown: BTreeMap<String, BreakdownEntry>,
        /// Rolling summary over the recent window
        summary: EventSummary,
    },

    /// The active configuration snapshot was replaced at runtime
    ///
    /// Emitted after a successful hot reload or preset application. Failed
    /// reloads emit nothing; the previous snapshot simply stays active.
    ConfigReloaded {
        /// What produced the new snapshot ("file", "preset:<name>")
        source: String,
        /// When the swap happened
        timestamp: DateTime<Utc>,
    },
}

/// Summary block carried on every `SentimentUpdate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Number of results in the summarized window
    pub total: u64,
    /// Result count per winning label
    pub label_distribution: BTreeMap<String, u64>,
    /// Mean fused confidence over the window
    pub avg_confidence: f64,
}

impl From<&WindowSummary> for EventSummary {
    fn from(s: &WindowSummary) -> Self {
        Self {
            total: s.count,
            label_distribution: s.label_distribution.clone(),
            avg_confidence: s.avg_confidence,
        }
    }
}

impl SentimentEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SentimentEvent::SentimentUpdate { .. } => "sentiment_update",
            SentimentEvent::ConfigReloaded { .. } => "config_reloaded",
        }
    }
}
