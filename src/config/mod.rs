//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → CLI overrides applied in main
//!
//! Mocks directory change:
//!     watcher.rs detects change
//!     → RuleStore::reload (rescan + atomic swap)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the rule table is hot-swapped
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{ListenerConfig, MocksConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig};
