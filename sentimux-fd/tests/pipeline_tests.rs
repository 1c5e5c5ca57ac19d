//! End-to-end pipeline tests
//!
//! Exercise the full ingestion path: fuse, aggregate, broadcast, trend.

use sentimux_common::events::SentimentEvent;
use sentimux_common::types::{ModalityJudgment, SentimentLabel};
use sentimux_fd::config::{ConfigStore, FusionConfig};
use sentimux_fd::pipeline::{Pipeline, PipelineOptions};
use sentimux_fd::trend::TrendStore;
use std::sync::Arc;

fn judgments(items: &[(&str, SentimentLabel, f64)]) -> Vec<ModalityJudgment> {
    items
        .iter()
        .map(|(m, l, c)| ModalityJudgment::new(*m, *l, *c))
        .collect()
}

fn default_pipeline(options: PipelineOptions) -> Pipeline {
    Pipeline::new(
        Arc::new(ConfigStore::new(FusionConfig::builtin_default())),
        options,
        None,
    )
}

#[tokio::test]
async fn test_subscriber_sees_every_result_in_order() {
    let pipeline = default_pipeline(PipelineOptions::default());
    let subscriber = pipeline.subscribe();

    let sets = [
        vec![("text", SentimentLabel::Positive, 0.9)],
        vec![("text", SentimentLabel::Negative, 0.8)],
        vec![("text", SentimentLabel::Neutral, 0.6)],
    ];
    let mut expected = Vec::new();
    for set in &sets {
        expected.push(pipeline.ingest(&judgments(set)).label);
    }

    for want in expected {
        match subscriber.try_recv().unwrap() {
            SentimentEvent::SentimentUpdate { label, .. } => assert_eq!(label, want),
            other => panic!("unexpected event {}", other.event_type()),
        }
    }
    assert!(subscriber.try_recv().is_none());
}

#[tokio::test]
async fn test_summary_tracks_recent_window() {
    let pipeline = default_pipeline(PipelineOptions {
        summary_window: 2,
        ..PipelineOptions::default()
    });

    pipeline.ingest(&judgments(&[("text", SentimentLabel::Negative, 0.9)]));
    pipeline.ingest(&judgments(&[("text", SentimentLabel::Positive, 0.9)]));
    pipeline.ingest(&judgments(&[("text", SentimentLabel::Positive, 0.9)]));

    let summary = pipeline.summary();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.label_distribution.get("positive"), Some(&2));
    assert_eq!(summary.label_distribution.get("negative"), None);
}

#[tokio::test]
async fn test_ring_eviction_through_pipeline() {
    let pipeline = default_pipeline(PipelineOptions {
        buffer_capacity: 3,
        ..PipelineOptions::default()
    });

    for _ in 0..10 {
        pipeline.ingest(&judgments(&[("text", SentimentLabel::Positive, 0.8)]));
    }
    let stats = pipeline.buffer_stats();
    assert_eq!(stats.len, 3);
    assert_eq!(stats.capacity, 3);
    assert_eq!(stats.evictions, 7);
}

#[tokio::test]
async fn test_disconnected_subscriber_does_not_stall_ingestion() {
    let pipeline = default_pipeline(PipelineOptions::default());
    let healthy = pipeline.subscribe();
    let doomed = pipeline.subscribe();
    drop(doomed);

    // Ingestion proceeds; the dead subscriber is evicted, the healthy one
    // receives every event
    for i in 0..5 {
        pipeline.ingest(&judgments(&[("text", SentimentLabel::Positive, 0.8)]));
        assert!(healthy.try_recv().is_some(), "event {} missing", i);
    }
    assert_eq!(pipeline.hub_stats().active_subscribers, 1);
    assert_eq!(pipeline.hub_stats().evicted_total, 1);
}

#[tokio::test]
async fn test_trend_written_through_pipeline() {
    let trend = Arc::new(TrendStore::open_in_memory().await.unwrap());
    let pipeline = Pipeline::new(
        Arc::new(ConfigStore::new(FusionConfig::builtin_default())),
        PipelineOptions::default(),
        Some(Arc::clone(&trend)),
    );

    pipeline.ingest(&judgments(&[
        ("text", SentimentLabel::Positive, 0.9),
        ("audio", SentimentLabel::Positive, 0.8),
    ]));

    // The trend write is a detached task; give it a moment to land
    let mut range = pipeline.trend(1).await.unwrap();
    for _ in 0..50 {
        if !range.buckets.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        range = pipeline.trend(1).await.unwrap();
    }

    assert_eq!(range.total_count, 1);
    assert_eq!(range.buckets[0].label, SentimentLabel::Positive);
    assert_eq!(trend.dropped_writes(), 0);
}

#[tokio::test]
async fn test_config_swap_affects_next_ingest_only() {
    let store = Arc::new(ConfigStore::new(FusionConfig::builtin_default()));
    let pipeline = Pipeline::new(Arc::clone(&store), PipelineOptions::default(), None);

    // Baseline under adaptive fusion
    let before = pipeline.ingest(&judgments(&[
        ("text", SentimentLabel::Positive, 0.9),
        ("audio", SentimentLabel::Positive, 0.9),
    ]));

    // Swap in a simple-method snapshot; subsequent ingests see it
    let mut doc = sentimux_fd::config::ConfigDocument::default();
    doc.method = sentimux_fd::config::FusionMethod::Simple;
    store.install(FusionConfig::from_document(doc, None));

    let after = pipeline.ingest(&judgments(&[
        ("text", SentimentLabel::Positive, 0.9),
        ("audio", SentimentLabel::Positive, 0.9),
    ]));

    // Same winner either way; both results are valid and the earlier one is
    // untouched by the swap
    assert_eq!(before.label, SentimentLabel::Positive);
    assert_eq!(after.label, SentimentLabel::Positive);
    assert!(before.confidence >= after.confidence);
}

#[tokio::test]
async fn test_empty_judgment_set_degrades_to_neutral() {
    let pipeline = default_pipeline(PipelineOptions::default());
    let result = pipeline.ingest(&[]);
    assert_eq!(result.label, SentimentLabel::Neutral);
    assert_eq!(result.confidence, 0.0);
    // Still buffered and summarized like any other result
    assert_eq!(pipeline.summary().count, 1);
}
