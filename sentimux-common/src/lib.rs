//! # SENTIMUX Common Library
//!
//! Shared code for the SENTIMUX fusion daemon:
//! - Sentiment data model (labels, judgments, fusion results)
//! - Event types (SentimentEvent enum)
//! - Error taxonomy

pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use types::{FusionResult, ModalityContribution, ModalityJudgment, SentimentLabel};
