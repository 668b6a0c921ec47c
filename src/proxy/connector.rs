//! Upstream connection establishment.
//!
//! # Responsibilities
//! - Work out the upstream host/port from an absolute request URI
//! - Rewrite the request for origin-form delivery (path + `Host`)
//! - Open exactly one HTTP/1.1 connection per forwarded exchange
//! - Tie the connection's lifetime to a lease owned by the exchange
//!
//! # Design Decisions
//! - No pooling: the connection is never reused across exchanges
//! - Connect (DNS + TCP) is bounded by a timeout; a single attempt only
//! - The connection driver runs on its own task; dropping the lease aborts
//!   it, which closes the socket

use std::time::Duration;

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::{HeaderValue, Method, Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::AbortHandle;

use crate::net::{ConnectionId, ConnectionTracker};
use crate::proxy::error::ProxyError;
use crate::proxy::relay::RelayBody;

/// Request body type sent upstream.
pub type UpstreamBody = RelayBody<Body>;

/// Where a forwarded request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// Host as written in the URI (IPv6 literals keep their brackets).
    pub host: String,
    pub port: u16,
}

impl UpstreamTarget {
    /// Extract the upstream from an absolute-form request URI.
    pub fn from_request(method: &Method, uri: &Uri) -> Result<Self, ProxyError> {
        if method == Method::CONNECT {
            return Err(ProxyError::BadRequestUrl(
                "CONNECT tunnels are not supported".to_string(),
            ));
        }

        let host = uri
            .host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ProxyError::BadRequestUrl(format!("'{}' has no host", uri)))?;

        match uri.scheme_str() {
            None | Some("http") => {}
            Some(other) => {
                return Err(ProxyError::BadRequestUrl(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        }

        Ok(Self {
            host: host.to_string(),
            port: uri.port_u16().unwrap_or(80),
        })
    }

    /// Host suitable for name resolution (brackets stripped).
    fn dial_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }
}

impl std::fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Rewrite a proxy request for the upstream.
///
/// The URI becomes origin-form (path, `/` if empty, plus any query). Every
/// `Host` header is replaced by the target host. Nothing else changes.
pub fn rewrite_request<B>(
    request: Request<B>,
    target: &UpstreamTarget,
) -> Result<Request<B>, ProxyError> {
    let (mut parts, body) = request.into_parts();

    let path = match parts.uri.path() {
        "" => "/",
        path => path,
    };
    let origin_form = match parts.uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    parts.uri = origin_form
        .parse()
        .map_err(|e| ProxyError::BadRequestUrl(format!("invalid path: {}", e)))?;

    let host = HeaderValue::from_str(&target.host)
        .map_err(|_| ProxyError::BadRequestUrl(format!("invalid host '{}'", target.host)))?;
    parts.headers.remove(HOST);
    parts.headers.insert(HOST, host);

    // The upstream side always speaks HTTP/1.x.
    if parts.version != Version::HTTP_10 {
        parts.version = Version::HTTP_11;
    }

    Ok(Request::from_parts(parts, body))
}

/// Opens upstream connections.
#[derive(Debug, Clone)]
pub struct UpstreamConnector {
    tracker: ConnectionTracker,
    connect_timeout: Duration,
}

impl UpstreamConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            tracker: ConnectionTracker::new(),
            connect_timeout,
        }
    }

    /// Live upstream connection accounting.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Connect to `target` and complete the HTTP/1.1 handshake.
    pub async fn connect(&self, target: &UpstreamTarget) -> Result<UpstreamConnection, ProxyError> {
        let dial = TcpStream::connect((target.dial_host(), target.port));
        let stream = match tokio::time::timeout(self.connect_timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ProxyError::UpstreamConnect {
                    target: target.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ProxyError::UpstreamTimeout {
                    target: target.to_string(),
                    after: self.connect_timeout,
                })
            }
        };
        let _ = stream.set_nodelay(true);

        let guard = self.tracker.track();
        let id = guard.id();

        let (sender, conn) = http1::Builder::new()
            .handshake::<_, UpstreamBody>(TokioIo::new(stream))
            .await
            .map_err(ProxyError::UpstreamHandshake)?;

        // The guard lives in the driver task so the count drops only when the
        // socket itself is gone, whether the task ends or is aborted.
        let driver = tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %id, error = %e, "Upstream connection ended with error");
            }
        });

        tracing::debug!(connection_id = %id, target = %target, "Upstream connected");

        Ok(UpstreamConnection {
            id,
            sender,
            lease: ConnectionLease {
                id,
                driver: driver.abort_handle(),
            },
        })
    }
}

/// Ownership token for one upstream connection. Dropping it closes the
/// connection.
#[derive(Debug)]
pub struct ConnectionLease {
    id: ConnectionId,
    driver: AbortHandle,
}

impl ConnectionLease {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// A connected, handshaken upstream, good for exactly one request.
#[derive(Debug)]
pub struct UpstreamConnection {
    id: ConnectionId,
    sender: http1::SendRequest<UpstreamBody>,
    lease: ConnectionLease,
}

impl UpstreamConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Send the request head, then stream its body as hyper pulls it.
    ///
    /// Resolves once the response head arrives. The response body keeps
    /// streaming afterwards; the returned lease must outlive it.
    pub async fn send(
        mut self,
        request: Request<UpstreamBody>,
    ) -> Result<(Response<Incoming>, ConnectionLease), ProxyError> {
        self.sender.ready().await.map_err(ProxyError::UpstreamHandshake)?;
        let response = self
            .sender
            .send_request(request)
            .await
            .map_err(ProxyError::Relay)?;
        Ok((response, self.lease))
    }
}
