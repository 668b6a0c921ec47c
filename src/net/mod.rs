//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream connect (proxy::connector)
//!     → connection.rs (ConnectionTracker::track → ConnectionGuard)
//!     → guard owned by the exchange's connection lease
//!     → dropped with the lease when the exchange ends
//! ```

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
