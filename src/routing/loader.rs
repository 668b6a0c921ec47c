//! Rule table loading from a mocks directory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::routing::router::{Rule, RuleTable, RuleTarget};

/// Errors raised while scanning the mocks directory.
#[derive(Debug, Error)]
pub enum RuleLoadError {
    /// The directory itself could not be listed.
    #[error("failed to read mocks directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking scan task did not complete.
    #[error("rule scan task failed: {0}")]
    Task(String),
}

/// Scan `dir` and build a rule table.
///
/// Entries are taken in file-name order. `name.json` becomes `/name*` served
/// from that file; a subdirectory `name` becomes `/name/*` served from its
/// `index.json`. Hidden entries and other files are ignored.
pub fn load_rules(dir: &Path) -> Result<RuleTable, RuleLoadError> {
    let read_dir = fs::read_dir(dir).map_err(|source| RuleLoadError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| RuleLoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        entries.push(entry);
    }
    entries.sort_by_key(|entry| entry.file_name());

    let mut rules = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::debug!(path = ?path, "Skipping non UTF-8 mock entry");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        // Follows symlinks so linked mock folders behave like real ones. A
        // dangling link or unreadable entry only loses its own rule.
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(path = ?path, error = %e, "Skipping uninspectable mock entry");
                continue;
            }
        };

        if metadata.is_dir() {
            rules.push(Rule::new(format!("/{}/*", name), RuleTarget::Directory(path)));
        } else if let Some(stem) = name.strip_suffix(".json") {
            rules.push(Rule::new(format!("/{}*", stem), RuleTarget::File(path)));
        } else {
            tracing::debug!(path = ?path, "Skipping non-JSON mock file");
        }
    }

    Ok(RuleTable::new(rules))
}
