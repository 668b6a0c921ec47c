//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the dispatch handler
//! - Wire up request tracing
//! - Optionally watch the mocks directory for changes
//! - Serve until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::watcher::{reload_on_change, MocksWatcher};
use crate::config::ProxyConfig;
use crate::net::ConnectionTracker;
use crate::proxy::{Dispatcher, UpstreamConnector};
use crate::routing::RuleStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the mock proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Create a server whose rules come from `config.mocks.dir`.
    pub fn new(config: ProxyConfig) -> Self {
        let rules = RuleStore::open(&config.mocks.dir);
        Self::with_rules(config, rules)
    }

    /// Create a server around an existing rule store.
    pub fn with_rules(config: ProxyConfig, rules: RuleStore) -> Self {
        let connector = UpstreamConnector::new(Duration::from_secs(config.timeouts.connect_secs));
        let dispatcher = Arc::new(
            Dispatcher::new(rules, connector, optional_secs(config.timeouts.idle_secs))
                .with_response_timeout(optional_secs(config.timeouts.response_secs)),
        );

        let state = AppState {
            dispatcher: Arc::clone(&dispatcher),
        };
        let router = Self::build_router(state);

        Self {
            router,
            config,
            dispatcher,
        }
    }

    /// Build the Axum router.
    ///
    /// Everything goes through the fallback: the dispatcher itself decides
    /// between control, mock and forward, so absolute-form proxy requests
    /// and plain origin-form requests take the same path. Deadlines live in
    /// the dispatcher, where they can be reported as upstream errors.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mocks = ?self.dispatcher.rules().source(),
            "HTTP server starting"
        );

        // Held for the server's lifetime; dropping it stops the watch.
        let _watcher = if self.config.mocks.watch {
            let (watcher, changes) = MocksWatcher::new(self.dispatcher.rules().source());
            match watcher.run() {
                Ok(handle) => {
                    tokio::spawn(reload_on_change(
                        self.dispatcher.rules().clone(),
                        changes,
                        shutdown.resubscribe(),
                    ));
                    Some(handle)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to watch mocks directory, automatic reload disabled");
                    None
                }
            }
        } else {
            None
        };

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Handle to the live rule table.
    pub fn rules(&self) -> RuleStore {
        self.dispatcher.rules().clone()
    }

    /// Live upstream connection accounting.
    pub fn upstream_connections(&self) -> ConnectionTracker {
        self.dispatcher.connector().tracker().clone()
    }
}

/// Seconds from config, where 0 means disabled.
fn optional_secs(secs: u64) -> Option<Duration> {
    match secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

/// Entry point for every request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.dispatcher.dispatch(request).await
}
