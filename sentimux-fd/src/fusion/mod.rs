//! Confidence-aware sentiment fusion
//!
//! Pure computation: `predict` is a function of the judgment set and one
//! config snapshot, with no side effects and no internal state. Identical
//! inputs always produce an identical decision.

mod agreement;
mod engine;

pub use agreement::{modality_agreement, ModalityAgreement};
pub use engine::{predict, predict_with_detail, FusionDetail};

/// Unanimous agreement bonus added to the winning score
pub const UNANIMOUS_BONUS: f64 = 0.10;

/// Strict-majority agreement bonus added to the winning score
pub const MAJORITY_BONUS: f64 = 0.05;

/// A judgment's dynamic weight never falls below this share of its base weight
pub const MIN_WEIGHT_FRACTION: f64 = 0.10;
