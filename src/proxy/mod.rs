//! Request dispatch and streaming relay.
//!
//! # Data Flow
//! ```text
//! request head
//!     → dispatcher.rs (control path? rule match? forward?)
//!     → exchange.rs (phase: AwaitingHead → Routed → StreamingBody → Completed | Failed)
//!
//! Forwarding:
//!     connector.rs (target from URI, Host rewrite, connect + handshake)
//!     → inbound body  ─ relay.rs ─▶ upstream request
//!     → upstream body ─ relay.rs ─▶ client response (owns exchange + connection lease)
//! ```
//!
//! # Design Decisions
//! - One upstream connection per forwarded exchange, never pooled
//! - Bodies stream frame by frame; nothing is buffered whole
//! - Connection lifetime follows the response body, so a departing client
//!   tears the upstream down with it
//! - Errors stay inside their exchange and become a client-visible status

pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod exchange;
pub mod relay;

pub use connector::{UpstreamConnection, UpstreamConnector, UpstreamTarget};
pub use dispatcher::{Dispatcher, RELOAD_PATH};
pub use error::ProxyError;
pub use exchange::{Exchange, RelayPhase, Route};
pub use relay::{Direction, RelayBody};
