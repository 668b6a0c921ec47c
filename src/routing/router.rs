//! Rule lookup.
//!
//! # Responsibilities
//! - Store rules in load order
//! - Return the first rule whose pattern matches the request path
//!
//! # Design Decisions
//! - Immutable after construction (shared via `Arc`, no locks)
//! - O(n) scan; mock sets are small enough that no index is needed
//! - Explicit `None` on no-match; the dispatcher decides what that means

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::routing::matcher::WildcardPattern;

/// File served for directory rules.
pub const INDEX_FILE: &str = "index.json";

/// What a rule points at on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum RuleTarget {
    /// Serve this file as-is.
    File(PathBuf),
    /// Serve `index.json` from this directory, resolved per request.
    Directory(PathBuf),
}

impl RuleTarget {
    /// The file that should be read for this target.
    pub fn resolve(&self) -> PathBuf {
        match self {
            RuleTarget::File(path) => path.clone(),
            RuleTarget::Directory(dir) => dir.join(INDEX_FILE),
        }
    }

    /// The path the rule was created from.
    pub fn path(&self) -> &Path {
        match self {
            RuleTarget::File(path) | RuleTarget::Directory(path) => path,
        }
    }
}

/// A single pattern → resource binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: WildcardPattern,
    pub target: RuleTarget,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, target: RuleTarget) -> Self {
        Self {
            pattern: WildcardPattern::new(pattern),
            target,
        }
    }
}

/// Ordered, immutable collection of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Build a table; `rules` order is the match order.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Find the first rule matching `path`.
    pub fn match_path(&self, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}
