//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, graceful shutdown)
//!     → proxy::Dispatcher
//!         → response.rs (control acknowledgement)
//!         → local.rs (mock file responses)
//!         → upstream relay
//!     → Send to client
//! ```

pub mod local;
pub mod response;
pub mod server;

pub use server::HttpServer;
