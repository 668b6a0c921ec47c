//! Local development HTTP proxy with file-backed mocks.
//!
//! Requests whose path matches a mock rule are answered from disk; everything
//! else is forwarded to the upstream named in the request URL and streamed
//! back unchanged.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{Dispatcher, RELOAD_PATH};
pub use routing::RuleStore;
