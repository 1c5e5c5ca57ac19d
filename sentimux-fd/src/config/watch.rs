//! Hot-reload watcher
//!
//! Background task polling the config file's modification time. On change the
//! file is re-loaded and the new snapshot installed; a document that fails
//! structural parsing keeps the previous snapshot and logs a warning. Reload
//! failure is never fatal.

use super::model::FusionConfig;
use super::store::ConfigStore;
use crate::hub::SentimentHub;
use sentimux_common::events::SentimentEvent;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the reload watcher
///
/// Polls `path` every `reload_interval` of the currently active snapshot, so
/// a reload that changes the interval takes effect on the next tick. The task
/// exits when `shutdown` flips to true. Successful reloads are announced to
/// hub subscribers as `ConfigReloaded`.
pub fn spawn_reload_watcher(
    store: Arc<ConfigStore>,
    path: PathBuf,
    hub: Arc<SentimentHub>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_modified = file_mtime(&path);
        info!("Watching {} for config changes", path.display());

        loop {
            let interval = store.current().reload_interval;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Config watcher shutting down");
                        return;
                    }
                    continue;
                }
            }

            let modified = file_mtime(&path);
            if modified == last_modified {
                continue;
            }
            last_modified = modified;

            let environment = store.current().environment.clone();
            match FusionConfig::load(&path, environment.as_deref()) {
                Ok(next) => {
                    store.install(next);
                    hub.publish(&SentimentEvent::ConfigReloaded {
                        source: "file".to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                Err(e) => {
                    // Previous snapshot stays active
                    warn!("Config reload rejected, keeping previous snapshot: {}", e);
                }
            }
        }
    })
}

fn file_mtime(path: &PathBuf) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
