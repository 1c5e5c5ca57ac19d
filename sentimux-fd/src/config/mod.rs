//! Fusion configuration
//!
//! Two-layer model in the spirit of a database-first settings table, adapted
//! to a single TOML source:
//!
//! 1. **Document** (`model`): the serde shape of the TOML file, with partial
//!    overrides for team presets and environment overlays.
//! 2. **Snapshot** (`FusionConfig`): the validated, immutable result of
//!    layering built-in defaults → file → environment overlay → runtime
//!    preset. Out-of-range values are corrected and logged, never fatal.
//!
//! Snapshots are shared through [`ConfigStore`] and replaced whole on reload;
//! readers are never blocked by a concurrent reload beyond the pointer copy.

mod model;
mod store;
mod watch;

pub use model::{
    ConfigDocument, ConfigOverride, FusionConfig, FusionMethod, DEFAULT_RELOAD_INTERVAL_SECS,
};
pub use store::ConfigStore;
pub use watch::spawn_reload_watcher;
