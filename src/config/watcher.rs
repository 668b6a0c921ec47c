//! Mocks directory watcher for automatic rule reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};

use crate::routing::RuleStore;

/// Watches the mocks directory and emits a reload request on change.
pub struct MocksWatcher {
    path: PathBuf,
    change_tx: mpsc::UnboundedSender<()>,
}

impl MocksWatcher {
    /// Create a new MocksWatcher.
    ///
    /// Returns the watcher and a receiver of change notifications.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                change_tx,
            },
            change_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    ///
    /// Only the top level is watched: directory rules resolve their index
    /// file per request, so nested edits need no reload.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_create() || event.kind.is_remove() || event.kind.is_modify() {
                        tracing::debug!(paths = ?event.paths, "Mocks directory changed");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Mocks watcher started");
        Ok(watcher)
    }
}

/// Reload `store` for every change notification until shutdown.
///
/// Bursts of events collapse into a single reload.
pub async fn reload_on_change(
    store: RuleStore,
    mut changes: mpsc::UnboundedReceiver<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            change = changes.recv() => {
                if change.is_none() {
                    break;
                }
                // Let editors finish writing before scanning.
                tokio::time::sleep(Duration::from_millis(100)).await;
                while changes.try_recv().is_ok() {}
                let _ = store.reload().await;
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Mocks reload loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RuleTable;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_change_notification_triggers_reload() {
        let dir = TempDir::new().unwrap();
        let store = RuleStore::new(RuleTable::default(), dir.path());
        fs::write(dir.path().join("fresh.json"), b"{}").unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(reload_on_change(store.clone(), rx, shutdown_rx));

        tx.send(()).unwrap();
        tx.send(()).unwrap();

        let mut reloaded = false;
        for _ in 0..50 {
            if store.snapshot().len() == 1 {
                reloaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(reloaded, "store should pick up the new mock");

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
