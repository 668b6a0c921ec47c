//! Per-exchange error taxonomy.
//!
//! Every variant maps to a client-visible status. None of them escape the
//! exchange that raised them.

use std::path::PathBuf;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::routing::RuleLoadError;

/// Errors that end an exchange early.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The request URI does not name a reachable plain-HTTP upstream.
    #[error("Bad URL: {0}")]
    BadRequestUrl(String),

    /// DNS, refused, unreachable.
    #[error("Failed to connect to upstream {target}: {source}")]
    UpstreamConnect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The connect deadline elapsed.
    #[error("Timed out connecting to upstream {target} after {}s", .after.as_secs())]
    UpstreamTimeout { target: String, after: Duration },

    /// The request was sent but no response head followed in time.
    #[error("Upstream {target} sent no response within {}s", .after.as_secs())]
    UpstreamResponseTimeout { target: String, after: Duration },

    #[error("Upstream handshake failed: {0}")]
    UpstreamHandshake(#[source] hyper::Error),

    /// The upstream failed before a response head was received.
    #[error("Upstream request failed: {0}")]
    Relay(#[source] hyper::Error),

    /// Mock file (or a directory's index file) is absent or unreadable.
    #[error("Local response not found: {}", .path.display())]
    LocalResourceMissing { path: PathBuf },

    #[error("Rule reload failed: {0}")]
    Reload(#[from] RuleLoadError),
}

impl ProxyError {
    /// Status code sent to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequestUrl(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamConnect { .. }
            | ProxyError::UpstreamHandshake(_)
            | ProxyError::Relay(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout { .. } | ProxyError::UpstreamResponseTimeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ProxyError::LocalResourceMissing { .. } => StatusCode::NOT_FOUND,
            ProxyError::Reload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::BadRequestUrl("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::LocalResourceMissing { path: "a.json".into() }.status(),
            StatusCode::NOT_FOUND
        );
        let refused = ProxyError::UpstreamConnect {
            target: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(refused.status(), StatusCode::BAD_GATEWAY);
        let timeout = ProxyError::UpstreamTimeout {
            target: "10.0.0.1:80".into(),
            after: Duration::from_secs(3),
        };
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(timeout.to_string().ends_with("after 3s"));

        let slow = ProxyError::UpstreamResponseTimeout {
            target: "127.0.0.1:9000".into(),
            after: Duration::from_secs(1),
        };
        assert_eq!(slow.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(slow.to_string(), "Upstream 127.0.0.1:9000 sent no response within 1s");
    }

    #[test]
    fn test_response_is_plain_text() {
        let response = ProxyError::BadRequestUrl("'/' has no host".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response.headers().get(CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    }
}
