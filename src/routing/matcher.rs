//! Wildcard path matching.
//!
//! # Responsibilities
//! - Compile a path template containing `*` wildcards
//! - Match a request path against the whole template
//!
//! # Design Decisions
//! - `*` matches zero or more of any character, including `/`
//! - Every other character is literal (dots, slashes, regex metacharacters)
//! - Anchored at both ends: substring hits do not count
//! - No regex: literal segments are matched left to right, O(path × pattern)

use std::fmt;

/// A compiled wildcard pattern such as `/api/v1/list*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    source: String,
    /// Literal runs between wildcards. `segments.len() == stars + 1`.
    segments: Vec<String>,
}

impl WildcardPattern {
    /// Compile a pattern. Consecutive `*` collapse into one.
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let segments = source.split('*').map(str::to_owned).collect();
        Self { source, segments }
    }

    /// The pattern text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if `path` matches the entire pattern.
    pub fn matches(&self, path: &str) -> bool {
        let (first, rest) = match self.segments.split_first() {
            Some(split) => split,
            None => return path.is_empty(),
        };

        // No wildcard at all: exact comparison.
        if rest.is_empty() {
            return path == first;
        }

        let Some(mut remaining) = path.strip_prefix(first.as_str()) else {
            return false;
        };

        let (last, middle) = match rest.split_last() {
            Some(split) => split,
            None => return true,
        };

        for segment in middle {
            if segment.is_empty() {
                continue;
            }
            match remaining.find(segment.as_str()) {
                Some(idx) => remaining = &remaining[idx + segment.len()..],
                None => return false,
            }
        }

        // The trailing literal must sit at the very end and must not
        // overlap text already consumed by earlier segments.
        remaining.len() >= last.len() && remaining.ends_with(last.as_str())
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
