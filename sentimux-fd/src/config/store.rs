//! Active configuration snapshot store
//!
//! Read-frequently, write-rarely access pattern: readers take a shared lock
//! only long enough to clone the `Arc`, so a fused prediction always sees one
//! coherent snapshot and is never blocked by a reload in progress. Writers
//! replace the `Arc` whole; in-flight readers keep the snapshot they already
//! hold.
//!
//! Constructed explicitly and injected into the pipeline; exactly one
//! process-wide instance is wired at startup.

use super::model::FusionConfig;
use sentimux_common::Result;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Holds the active [`FusionConfig`] snapshot
pub struct ConfigStore {
    active: RwLock<Arc<FusionConfig>>,
}

impl ConfigStore {
    pub fn new(initial: FusionConfig) -> Self {
        info!("Config active: {}", initial.describe());
        Self {
            active: RwLock::new(Arc::new(initial)),
        }
    }

    /// Current snapshot (cheap Arc clone)
    pub fn current(&self) -> Arc<FusionConfig> {
        self.active.read().unwrap().clone()
    }

    /// Replace the active snapshot
    ///
    /// Visible to subsequent `current()` calls only; readers holding the old
    /// Arc are unaffected.
    pub fn install(&self, next: FusionConfig) {
        info!("Config replaced: {}", next.describe());
        *self.active.write().unwrap() = Arc::new(next);
    }

    /// Layer a named team preset over the active snapshot atomically
    ///
    /// Unknown presets are an error; the active snapshot stays untouched.
    pub fn apply_preset(&self, name: &str) -> Result<()> {
        let next = self.current().with_preset(name)?;
        self.install(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ConfigDocument;

    #[test]
    fn test_current_returns_installed_snapshot() {
        let store = ConfigStore::new(FusionConfig::builtin_default());
        assert_eq!(store.current().confidence_threshold, 0.70);

        let mut doc = ConfigDocument::default();
        doc.confidence_threshold = 0.85;
        store.install(FusionConfig::from_document(doc, None));
        assert_eq!(store.current().confidence_threshold, 0.85);
    }

    #[test]
    fn test_in_flight_readers_keep_their_snapshot() {
        let store = ConfigStore::new(FusionConfig::builtin_default());
        let held = store.current();

        let mut doc = ConfigDocument::default();
        doc.confidence_threshold = 0.90;
        store.install(FusionConfig::from_document(doc, None));

        // The snapshot taken before the swap is unchanged
        assert_eq!(held.confidence_threshold, 0.70);
        assert_eq!(store.current().confidence_threshold, 0.90);
    }

    #[test]
    fn test_apply_unknown_preset_keeps_active() {
        let store = ConfigStore::new(FusionConfig::builtin_default());
        assert!(store.apply_preset("missing").is_err());
        assert_eq!(store.current().confidence_threshold, 0.70);
    }
}
