//! Request dispatch.
//!
//! # Responsibilities
//! - Intercept the rule reload control path before anything else
//! - Serve mock files for paths matched by the rule table
//! - Forward everything else to the upstream named in the request URI
//! - Stream the upstream response back through a `RelayBody`
//!
//! # Ordering
//! The inbound body is handed to hyper inside the forwarded request, and hyper
//! only polls it after the request head has been written upstream. Chunks that
//! arrive before the connection is ready therefore wait in the socket buffer;
//! none can overtake the head.
//!
//! # Deadlines
//! The response-head deadline starts once the request body has been fully
//! sent, so a long upload is never cut short by it.

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;
use tokio::sync::oneshot;

use crate::http::{local, response};
use crate::proxy::connector::{rewrite_request, ConnectionLease, UpstreamConnector, UpstreamTarget};
use crate::proxy::error::ProxyError;
use crate::proxy::exchange::{Exchange, Route};
use crate::proxy::relay::{Direction, RelayBody};
use crate::routing::RuleStore;

/// Path that triggers a rule reload. Matched on path only, any method.
pub const RELOAD_PATH: &str = "/__reload_rules";

/// Routes each request to the control endpoint, a mock, or the upstream.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    rules: RuleStore,
    connector: UpstreamConnector,
    idle_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(rules: RuleStore, connector: UpstreamConnector, idle_timeout: Option<Duration>) -> Self {
        Self {
            rules,
            connector,
            idle_timeout,
            response_timeout: None,
        }
    }

    /// Fail with 504 when the upstream takes longer than `after` to send its
    /// response head once the request is fully sent.
    pub fn with_response_timeout(mut self, after: Option<Duration>) -> Self {
        self.response_timeout = after;
        self
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn connector(&self) -> &UpstreamConnector {
        &self.connector
    }

    /// Handle one request from head arrival to response.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let mut exchange = Exchange::begin(request.method(), request.uri());
        let path = request.uri().path();

        if path == RELOAD_PATH {
            exchange.routed(Route::Control);
            let response = match self.rules.reload().await {
                Ok(_) => response::reload_ack(),
                Err(e) => ProxyError::from(e).into_response(),
            };
            exchange.respond(response.status());
            return response;
        }

        // The snapshot is bound for this lookup; a concurrent reload swaps
        // the store, not this table.
        let table = self.rules.snapshot();
        if let Some(rule) = table.match_path(path) {
            exchange.routed(Route::Local);
            tracing::debug!(
                exchange_id = %exchange.id(),
                pattern = %rule.pattern,
                target = ?rule.target.path(),
                "Mock rule matched"
            );
            let response = match local::serve(&rule.target).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            };
            exchange.respond(response.status());
            return response;
        }

        exchange.routed(Route::Forwarding);
        match self.forward(request).await {
            Ok((upstream, lease)) => {
                exchange.streaming(upstream.status());
                let (parts, body) = upstream.into_parts();
                let body = RelayBody::new(body, Direction::Outbound)
                    .with_idle_timeout(self.idle_timeout)
                    .with_exchange(exchange)
                    .with_lease(lease);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                exchange.fail(Some(e.status()), &e);
                e.into_response()
            }
        }
    }

    /// Connect to the request's upstream and send it.
    async fn forward(
        &self,
        request: Request<Body>,
    ) -> Result<(axum::http::Response<Incoming>, ConnectionLease), ProxyError> {
        let target = UpstreamTarget::from_request(request.method(), request.uri())?;
        let request = rewrite_request(request, &target)?;
        let connection = self.connector.connect(&target).await?;

        tracing::debug!(
            connection_id = %connection.id(),
            target = %target,
            method = %request.method(),
            path = %request.uri(),
            "Forwarding request"
        );

        let (uploaded_tx, uploaded_rx) = oneshot::channel();
        let request = request
            .map(|body| RelayBody::new(body, Direction::Inbound).with_end_signal(uploaded_tx));

        let Some(after) = self.response_timeout else {
            return connection.send(request).await;
        };

        let send = connection.send(request);
        tokio::pin!(send);

        // An early response is fine; otherwise wait out the upload first.
        tokio::select! {
            result = &mut send => return result,
            _ = uploaded_rx => {}
        }

        match tokio::time::timeout(after, send).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::UpstreamResponseTimeout {
                target: target.to_string(),
                after,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Rule, RuleTable, RuleTarget};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use std::fs;
    use tempfile::TempDir;

    fn dispatcher(dir: &std::path::Path) -> Dispatcher {
        Dispatcher::new(
            RuleStore::open(dir),
            UpstreamConnector::new(Duration::from_secs(2)),
            None,
        )
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_mock_served_for_matching_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("list.json"), b"[1,2,3]").unwrap();

        let response = dispatcher(dir.path())
            .dispatch(Request::get("http://api.example.com/list/all").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_string(response).await, "[1,2,3]");
    }

    #[tokio::test]
    async fn test_control_path_wins_over_rules() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("__reload_rules.json"), b"{\"mock\":true}").unwrap();
        let dispatcher = dispatcher(dir.path());
        assert!(dispatcher.rules().snapshot().match_path(RELOAD_PATH).is_some());

        let response = dispatcher
            .dispatch(Request::post(RELOAD_PATH).body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        assert!(body_string(response).await.contains("Rules Reloaded"));
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_rules() {
        let dir = TempDir::new().unwrap();
        let rules = RuleStore::new(
            RuleTable::new(vec![Rule::new("/a*", RuleTarget::File("a.json".into()))]),
            dir.path().join("missing"),
        );
        let dispatcher = Dispatcher::new(rules, UpstreamConnector::new(Duration::from_secs(1)), None);

        let response = dispatcher
            .dispatch(Request::get(RELOAD_PATH).body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(dispatcher.rules().snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_origin_form_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(dir.path());

        let response = dispatcher
            .dispatch(Request::get("/not/mocked").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(dispatcher.connector().tracker().active_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_directory_index_is_not_found() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("accounts")).unwrap();

        let response = dispatcher(dir.path())
            .dispatch(Request::get("/accounts/1").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
