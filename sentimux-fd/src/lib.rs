//! # SENTIMUX Fusion Daemon
//!
//! Fuses independent per-modality sentiment judgments into a single decision
//! and feeds the result through a bounded aggregation and broadcast pipeline:
//!
//! - `config` — validated, hot-reloadable configuration snapshots with presets
//! - `fusion` — the confidence-aware fusion algorithm (pure)
//! - `aggregate` — fixed-capacity ring of recent results + rolling summaries
//! - `hub` — multi-subscriber broadcast with bounded drop-oldest queues
//! - `trend` — best-effort per-hour/per-label aggregate persistence
//! - `pipeline` — the sequential ingestion path tying the above together
//!
//! Per-modality classification, HTTP wiring, and transport are external
//! collaborators; this crate only consumes `(modality, label, confidence)`
//! judgments and produces fused results and events.

pub mod aggregate;
pub mod config;
pub mod fusion;
pub mod hub;
pub mod pipeline;
pub mod trend;

pub use config::{ConfigStore, FusionConfig, FusionMethod};
pub use pipeline::Pipeline;
