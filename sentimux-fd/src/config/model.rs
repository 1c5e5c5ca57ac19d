//! Configuration document and validated snapshot
//!
//! The document is what serde sees in the TOML file. The snapshot is what the
//! rest of the daemon consumes: weights normalized to sum 1, thresholds
//! clamped into range, environment overlay already merged. Validation
//! corrects and logs; it only fails on structural problems (unparseable TOML,
//! missing `weights` section), in which case the caller keeps the previous
//! snapshot.

use sentimux_common::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Weight sums further than this from 1.0 are renormalized
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Clamp range for `confidence_threshold`
pub const CONFIDENCE_THRESHOLD_MIN: f64 = 0.50;
pub const CONFIDENCE_THRESHOLD_MAX: f64 = 0.95;

/// Default poll interval for the reload watcher
pub const DEFAULT_RELOAD_INTERVAL_SECS: u64 = 30;

/// Fusion method selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMethod {
    /// Base weights only, no dynamic scaling
    Simple,
    /// Dynamic per-modality weight scaling from judgment confidence
    ConfidenceWeighted,
    /// Dynamic scaling plus the unanimous consensus boost
    #[default]
    Adaptive,
}

impl FusionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FusionMethod::Simple => "simple",
            FusionMethod::ConfidenceWeighted => "confidence_weighted",
            FusionMethod::Adaptive => "adaptive",
        }
    }
}

/// Partial override: a team preset or environment overlay
///
/// Every field optional; present fields replace the corresponding snapshot
/// field wholesale (weights replace the whole map, they do not merge per key).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverride {
    pub weights: Option<BTreeMap<String, f64>>,
    pub method: Option<FusionMethod>,
    pub confidence_threshold: Option<f64>,
    pub uncertainty_penalty: Option<f64>,
    pub consensus_boost: Option<f64>,
}

/// The TOML document shape
///
/// `weights` is deliberately required: a document without it fails structural
/// parsing and a hot reload of such a document is rejected, keeping the
/// previous snapshot active. Everything else has built-in defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigDocument {
    /// Base weight per modality; renormalized to sum 1 if needed
    pub weights: BTreeMap<String, f64>,

    #[serde(default)]
    pub method: FusionMethod,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    #[serde(default = "default_uncertainty_penalty")]
    pub uncertainty_penalty: f64,

    #[serde(default = "default_consensus_boost")]
    pub consensus_boost: f64,

    /// Named partial overrides applicable at runtime
    #[serde(default)]
    pub team_presets: BTreeMap<String, ConfigOverride>,

    /// Partial overrides merged at load time, keyed by environment name
    #[serde(default)]
    pub environment_overlays: BTreeMap<String, ConfigOverride>,

    #[serde(default = "default_reload_interval")]
    pub reload_interval_seconds: u64,
}

fn default_confidence_threshold() -> f64 {
    0.70
}

fn default_uncertainty_penalty() -> f64 {
    0.50
}

fn default_consensus_boost() -> f64 {
    0.15
}

fn default_reload_interval() -> u64 {
    DEFAULT_RELOAD_INTERVAL_SECS
}

fn default_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("text".to_string(), 0.40),
        ("audio".to_string(), 0.35),
        ("video".to_string(), 0.25),
    ])
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            method: FusionMethod::default(),
            confidence_threshold: default_confidence_threshold(),
            uncertainty_penalty: default_uncertainty_penalty(),
            consensus_boost: default_consensus_boost(),
            team_presets: BTreeMap::new(),
            environment_overlays: BTreeMap::new(),
            reload_interval_seconds: default_reload_interval(),
        }
    }
}

/// Immutable, validated configuration snapshot
///
/// Invariants: weights sum to 1.0 within tolerance, thresholds in range.
/// Produced by [`FusionConfig::from_document`]; never mutated in place.
#[derive(Debug, Clone)]
pub struct FusionConfig {
    pub weights: BTreeMap<String, f64>,
    pub method: FusionMethod,
    pub confidence_threshold: f64,
    pub uncertainty_penalty: f64,
    pub consensus_boost: f64,
    /// Presets retained for runtime application
    pub team_presets: BTreeMap<String, ConfigOverride>,
    pub reload_interval: Duration,
    /// Preset currently layered on top, if any
    pub active_preset: Option<String>,
    /// Environment whose overlay was merged, if any
    pub environment: Option<String>,
}

impl FusionConfig {
    /// Built-in defaults, used when no config file is supplied
    pub fn builtin_default() -> Self {
        Self::from_document(ConfigDocument::default(), None)
    }

    /// Read and validate a config file, merging the overlay for `environment`
    ///
    /// Structural failures (unreadable file, unparseable TOML, missing
    /// `weights`) are errors; value-range problems are corrected and logged.
    pub fn load(path: &Path, environment: Option<&str>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigValidation(format!("cannot read {}: {}", path.display(), e)))?;
        let doc: ConfigDocument = toml::from_str(&raw)
            .map_err(|e| Error::ConfigValidation(format!("cannot parse {}: {}", path.display(), e)))?;
        Ok(Self::from_document(doc, environment))
    }

    /// Load `path` if given, falling back to built-in defaults on any failure
    ///
    /// Startup counterpart of the non-fatal reload policy: a bad config file
    /// produces a warning and a running daemon, not a dead process.
    pub fn load_or_default(path: Option<&Path>, environment: Option<&str>) -> Self {
        match path {
            Some(p) => match Self::load(p, environment) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Config load failed ({}), using built-in defaults", e);
                    let mut config = Self::builtin_default();
                    config.environment = environment.map(String::from);
                    config
                }
            },
            None => {
                let mut config = Self::builtin_default();
                config.environment = environment.map(String::from);
                config
            }
        }
    }

    /// Validate a parsed document into a snapshot
    pub fn from_document(doc: ConfigDocument, environment: Option<&str>) -> Self {
        let mut config = Self {
            weights: doc.weights,
            method: doc.method,
            confidence_threshold: doc.confidence_threshold,
            uncertainty_penalty: doc.uncertainty_penalty,
            consensus_boost: doc.consensus_boost,
            team_presets: doc.team_presets,
            reload_interval: Duration::from_secs(doc.reload_interval_seconds.max(1)),
            active_preset: None,
            environment: environment.map(String::from),
        };

        if let Some(env) = environment {
            if let Some(overlay) = doc.environment_overlays.get(env).cloned() {
                config.merge_override(&overlay);
                info!("Merged environment overlay '{}'", env);
            }
        }

        config.correct_ranges();
        config
    }

    /// Produce a new snapshot with a named preset layered on top
    ///
    /// Unknown preset names are an error and leave the receiver untouched.
    pub fn with_preset(&self, name: &str) -> Result<Self> {
        let preset = self
            .team_presets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ConfigValidation(format!("unknown preset '{}'", name)))?;

        let mut next = self.clone();
        next.merge_override(&preset);
        next.correct_ranges();
        next.active_preset = Some(name.to_string());
        Ok(next)
    }

    fn merge_override(&mut self, ov: &ConfigOverride) {
        if let Some(weights) = &ov.weights {
            self.weights = weights.clone();
        }
        if let Some(method) = ov.method {
            self.method = method;
        }
        if let Some(t) = ov.confidence_threshold {
            self.confidence_threshold = t;
        }
        if let Some(p) = ov.uncertainty_penalty {
            self.uncertainty_penalty = p;
        }
        if let Some(b) = ov.consensus_boost {
            self.consensus_boost = b;
        }
    }

    /// Correct out-of-range values in place, logging each correction
    fn correct_ranges(&mut self) {
        let sum: f64 = self.weights.values().copied().filter(|w| w.is_finite() && *w > 0.0).sum();
        if sum <= 0.0 {
            warn!("Weight map empty or non-positive, restoring built-in default weights");
            self.weights = default_weights();
        } else if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            warn!("Weights sum to {:.6}, renormalizing to 1.0", sum);
            for w in self.weights.values_mut() {
                if !w.is_finite() || *w < 0.0 {
                    *w = 0.0;
                } else {
                    *w /= sum;
                }
            }
        }

        let t = self.confidence_threshold;
        if !(CONFIDENCE_THRESHOLD_MIN..=CONFIDENCE_THRESHOLD_MAX).contains(&t) || t.is_nan() {
            let clamped = if t.is_nan() {
                default_confidence_threshold()
            } else {
                t.clamp(CONFIDENCE_THRESHOLD_MIN, CONFIDENCE_THRESHOLD_MAX)
            };
            warn!("confidence_threshold {} out of range, clamped to {}", t, clamped);
            self.confidence_threshold = clamped;
        }

        if !(0.0..=1.0).contains(&self.uncertainty_penalty) || self.uncertainty_penalty.is_nan() {
            let clamped = if self.uncertainty_penalty.is_nan() {
                default_uncertainty_penalty()
            } else {
                self.uncertainty_penalty.clamp(0.0, 1.0)
            };
            warn!(
                "uncertainty_penalty {} out of range, clamped to {}",
                self.uncertainty_penalty, clamped
            );
            self.uncertainty_penalty = clamped;
        }

        if !(0.0..=1.0).contains(&self.consensus_boost) || self.consensus_boost.is_nan() {
            let clamped = if self.consensus_boost.is_nan() {
                default_consensus_boost()
            } else {
                self.consensus_boost.clamp(0.0, 1.0)
            };
            warn!(
                "consensus_boost {} out of range, clamped to {}",
                self.consensus_boost, clamped
            );
            self.consensus_boost = clamped;
        }
    }

    /// Base weight for a modality; unknown modalities default to 1.0
    pub fn base_weight(&self, modality: &str) -> f64 {
        self.weights.get(modality).copied().unwrap_or(1.0)
    }

    /// Human-readable provenance line for logs
    pub fn describe(&self) -> String {
        format!(
            "method={} threshold={:.2} preset={} env={}",
            self.method.as_str(),
            self.confidence_threshold,
            self.active_preset.as_deref().unwrap_or("-"),
            self.environment.as_deref().unwrap_or("-"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(toml_str: &str) -> ConfigDocument {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = FusionConfig::builtin_default();
        assert_eq!(config.method, FusionMethod::Adaptive);
        assert_eq!(config.confidence_threshold, 0.70);
        let sum: f64 = config.weights.values().sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_missing_weights_is_structural_error() {
        let result = toml::from_str::<ConfigDocument>("method = \"simple\"");
        assert!(result.is_err(), "weights section must be required");
    }

    #[test]
    fn test_weights_renormalized() {
        let config = FusionConfig::from_document(
            doc("[weights]\ntext = 2.0\naudio = 2.0"),
            None,
        );
        let sum: f64 = config.weights.values().sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((config.weights["text"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_fall_back_to_defaults() {
        let config = FusionConfig::from_document(
            doc("[weights]\ntext = 0.0\naudio = 0.0"),
            None,
        );
        let sum: f64 = config.weights.values().sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!(config.weights.contains_key("video"));
    }

    #[test]
    fn test_threshold_clamped_not_rejected() {
        let config = FusionConfig::from_document(
            doc("confidence_threshold = 3.0\n[weights]\ntext = 1.0"),
            None,
        );
        assert_eq!(config.confidence_threshold, CONFIDENCE_THRESHOLD_MAX);

        let config = FusionConfig::from_document(
            doc("confidence_threshold = 0.1\n[weights]\ntext = 1.0"),
            None,
        );
        assert_eq!(config.confidence_threshold, CONFIDENCE_THRESHOLD_MIN);
    }

    #[test]
    fn test_environment_overlay_merged() {
        let config = FusionConfig::from_document(
            doc(
                "confidence_threshold = 0.7\n\
                 [weights]\n\
                 text = 1.0\n\
                 [environment_overlays.staging]\n\
                 confidence_threshold = 0.9\n",
            ),
            Some("staging"),
        );
        assert_eq!(config.confidence_threshold, 0.9);
        assert_eq!(config.environment.as_deref(), Some("staging"));
    }

    #[test]
    fn test_preset_application_is_copy_on_write() {
        let base = FusionConfig::from_document(
            doc(
                "[weights]\n\
                 text = 0.5\n\
                 audio = 0.5\n\
                 [team_presets.cautious]\n\
                 confidence_threshold = 0.9\n\
                 method = \"simple\"\n",
            ),
            None,
        );

        let preset = base.with_preset("cautious").unwrap();
        assert_eq!(preset.confidence_threshold, 0.9);
        assert_eq!(preset.method, FusionMethod::Simple);
        assert_eq!(preset.active_preset.as_deref(), Some("cautious"));

        // The original snapshot is untouched
        assert_eq!(base.confidence_threshold, 0.70);
        assert_eq!(base.method, FusionMethod::Adaptive);
        assert!(base.active_preset.is_none());
    }

    #[test]
    fn test_unknown_preset_is_error() {
        let base = FusionConfig::builtin_default();
        assert!(base.with_preset("nope").is_err());
    }

    #[test]
    fn test_preset_weights_renormalized() {
        let base = FusionConfig::from_document(
            doc(
                "[weights]\n\
                 text = 1.0\n\
                 [team_presets.tilted]\n\
                 weights = { text = 3.0, audio = 1.0 }\n",
            ),
            None,
        );
        let preset = base.with_preset("tilted").unwrap();
        let sum: f64 = preset.weights.values().sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((preset.weights["text"] - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_modality_base_weight() {
        let config = FusionConfig::builtin_default();
        assert_eq!(config.base_weight("haptics"), 1.0);
    }
}
