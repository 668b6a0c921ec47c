//! Mock file responses.
//!
//! Reads go through `tokio::fs`, which runs them on the blocking pool, so a
//! slow disk never stalls the runtime workers.

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use crate::proxy::error::ProxyError;
use crate::routing::RuleTarget;

/// Content type of every mock response.
pub const MOCK_CONTENT_TYPE: &str = "application/json";

/// Serve the file a rule points at as a complete `200 application/json`.
///
/// Directory targets serve their `index.json`. Missing and unreadable files
/// both surface as `LocalResourceMissing`.
pub async fn serve(target: &RuleTarget) -> Result<Response, ProxyError> {
    let path = target.resolve();
    match tokio::fs::read(&path).await {
        Ok(contents) => {
            tracing::debug!(path = ?path, bytes = contents.len(), "Serving local mock");
            Ok(([(CONTENT_TYPE, MOCK_CONTENT_TYPE)], contents).into_response())
        }
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Local mock unavailable");
            Err(ProxyError::LocalResourceMissing { path })
        }
    }
}
