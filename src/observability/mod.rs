//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher / relay / rule store produce:
//!     → logging.rs (structured tracing events, exchange id as a field)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
