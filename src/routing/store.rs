//! Swappable rule table handle.
//!
//! Readers take a full `Arc<RuleTable>` snapshot and keep it for the rest of
//! their exchange. Reloads build a fresh table off the runtime and swap the
//! pointer, so a lookup sees either the old table or the new one, never a mix.
//! Reloads run one at a time so the last scan to start is the last to publish.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::observability::metrics;
use crate::routing::loader::{load_rules, RuleLoadError};
use crate::routing::router::RuleTable;

/// Shared handle to the current rule table.
#[derive(Debug, Clone)]
pub struct RuleStore {
    current: Arc<ArcSwap<RuleTable>>,
    source: Arc<PathBuf>,
    reload_lock: Arc<Mutex<()>>,
}

impl RuleStore {
    /// Wrap an already-built table. `source` is the directory reloads scan.
    pub fn new(table: RuleTable, source: impl Into<PathBuf>) -> Self {
        metrics::record_rules_loaded(table.len());
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
            source: Arc::new(source.into()),
            reload_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load the initial table from `dir`.
    ///
    /// A missing or unreadable directory is not fatal at startup: the store
    /// starts empty so every request is forwarded until a reload succeeds.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let table = match load_rules(&dir) {
            Ok(table) => {
                tracing::info!(dir = ?dir, rules = table.len(), "Mock rules loaded");
                table
            }
            Err(e) => {
                tracing::warn!(error = %e, "Starting with an empty rule table");
                RuleTable::default()
            }
        };
        Self::new(table, dir)
    }

    /// Current table snapshot.
    pub fn snapshot(&self) -> Arc<RuleTable> {
        self.current.load_full()
    }

    /// Directory scanned on reload.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Rescan the mocks directory and swap in the result.
    ///
    /// On failure the current table stays in place. Returns the new rule count.
    pub async fn reload(&self) -> Result<usize, RuleLoadError> {
        // Held across scan and swap.
        let _reloading = self.reload_lock.lock().await;
        let dir = Arc::clone(&self.source);
        let loaded = tokio::task::spawn_blocking(move || load_rules(&dir))
            .await
            .map_err(|e| RuleLoadError::Task(e.to_string()))
            .and_then(|result| result);

        match loaded {
            Ok(table) => {
                let count = table.len();
                self.current.store(Arc::new(table));
                metrics::record_reload(true);
                metrics::record_rules_loaded(count);
                tracing::info!(rules = count, "Rules reloaded");
                Ok(count)
            }
            Err(e) => {
                metrics::record_reload(false);
                tracing::error!(error = %e, "Rule reload failed, keeping current rules");
                Err(e)
            }
        }
    }
}
