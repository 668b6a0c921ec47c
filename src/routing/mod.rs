//! Mock rule subsystem.
//!
//! # Data Flow
//! ```text
//! mocks directory listing
//!     → loader.rs (one rule per entry, file-name order)
//!     → router.rs (immutable RuleTable, first match wins)
//!     → store.rs (ArcSwap handle, atomic reload)
//!
//! Request path
//!     → store snapshot → RuleTable::match_path
//!     → matcher.rs (anchored `*` wildcard)
//!     → Some(rule) | None
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; a reload builds a new one and swaps the pointer
//! - No regex: wildcard matching is literal segment scanning
//! - Deterministic: same table and path always yield the same rule

pub mod loader;
pub mod matcher;
pub mod router;
pub mod store;

pub use loader::{load_rules, RuleLoadError};
pub use matcher::WildcardPattern;
pub use router::{Rule, RuleTable, RuleTarget, INDEX_FILE};
pub use store::RuleStore;
