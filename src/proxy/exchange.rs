//! Per-request exchange state.
//!
//! An `Exchange` lives from request-head arrival until the response is fully
//! written or abandoned. Forwarded exchanges hand themselves to the response
//! `RelayBody`, so they end exactly when the body does. Dropping an exchange
//! that never reached a terminal phase records it as cancelled.

use std::fmt;
use std::time::Instant;

use axum::http::{Method, StatusCode, Uri};
use uuid::Uuid;

use crate::observability::metrics;

/// Status recorded for exchanges abandoned by the client.
const CLIENT_CLOSED: u16 = 499;

/// How an exchange was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The rule reload endpoint.
    Control,
    /// Served from a mock file.
    Local,
    /// Relayed to the upstream named in the URL.
    Forwarding,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Control => "control",
            Route::Local => "local",
            Route::Forwarding => "forwarding",
        }
    }
}

/// Lifecycle phase of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    AwaitingHead,
    Routed(Route),
    /// Response head sent; body frames flowing.
    StreamingBody,
    Completed,
    Failed,
}

impl RelayPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayPhase::Completed | RelayPhase::Failed)
    }
}

/// State for one in-flight request.
#[derive(Debug)]
pub struct Exchange {
    id: Uuid,
    method: Method,
    uri: Uri,
    route: Option<Route>,
    phase: RelayPhase,
    status: Option<StatusCode>,
    started: Instant,
}

impl Exchange {
    /// Start tracking a request whose head just arrived.
    pub fn begin(method: &Method, uri: &Uri) -> Self {
        let exchange = Self {
            id: Uuid::new_v4(),
            method: method.clone(),
            uri: uri.clone(),
            route: None,
            phase: RelayPhase::AwaitingHead,
            status: None,
            started: Instant::now(),
        };
        tracing::debug!(
            exchange_id = %exchange.id,
            method = %exchange.method,
            uri = %exchange.uri,
            "Request received"
        );
        exchange
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    pub fn route(&self) -> Option<Route> {
        self.route
    }

    /// AwaitingHead → Routed.
    pub fn routed(&mut self, route: Route) {
        self.route = Some(route);
        self.transition(RelayPhase::Routed(route));
    }

    /// Routed(Forwarding) → StreamingBody, once the upstream head is relayed.
    pub fn streaming(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.transition(RelayPhase::StreamingBody);
    }

    /// Terminal: a complete response was written.
    ///
    /// For single-shot responses the status decides success; error statuses
    /// produced by the proxy itself count as failures.
    pub fn respond(&mut self, status: StatusCode) {
        self.status = Some(status);
        if status.is_client_error() || status.is_server_error() {
            self.finish(RelayPhase::Failed, None);
        } else {
            self.finish(RelayPhase::Completed, None);
        }
    }

    /// Terminal: the relayed body reached end-of-stream.
    pub fn complete(&mut self, bytes: u64) {
        tracing::debug!(exchange_id = %self.id, bytes, "Response body relayed");
        self.finish(RelayPhase::Completed, None);
    }

    /// Terminal: an error ended the exchange.
    pub fn fail(&mut self, status: Option<StatusCode>, reason: &dyn fmt::Display) {
        if status.is_some() {
            self.status = status;
        }
        self.finish(RelayPhase::Failed, Some(reason));
    }

    fn transition(&mut self, next: RelayPhase) {
        tracing::trace!(exchange_id = %self.id, from = ?self.phase, to = ?next, "Exchange phase");
        self.phase = next;
    }

    fn finish(&mut self, terminal: RelayPhase, reason: Option<&dyn fmt::Display>) {
        if self.phase.is_terminal() {
            return;
        }
        self.transition(terminal);

        let route = self.route.map(|r| r.as_str()).unwrap_or("none");
        let status = self.status.map(|s| s.as_u16()).unwrap_or(CLIENT_CLOSED);
        metrics::record_exchange(route, status, self.started);

        match reason {
            Some(reason) => tracing::warn!(
                exchange_id = %self.id,
                method = %self.method,
                uri = %self.uri,
                route,
                status,
                error = %reason,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "Exchange failed"
            ),
            None => tracing::info!(
                exchange_id = %self.id,
                method = %self.method,
                uri = %self.uri,
                route,
                status,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "Exchange completed"
            ),
        }
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if !self.phase.is_terminal() {
            self.fail(None, &"client went away");
        }
    }
}
