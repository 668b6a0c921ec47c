//! OS signal handling.
//!
//! SIGINT/SIGTERM end the process gracefully. SIGHUP reloads the mock rules
//! and keeps running.

use crate::lifecycle::Shutdown;
use crate::routing::RuleStore;

/// Wait for a termination signal, reloading rules on every SIGHUP.
/// Triggers `shutdown` before returning.
#[cfg(unix)]
pub async fn listen(rules: RuleStore, shutdown: Shutdown) {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut hangup) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(terminate), Ok(hangup)) => (terminate, hangup),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Failed to install signal handlers, falling back to Ctrl+C");
            wait_for_ctrl_c().await;
            shutdown.trigger();
            return;
        }
    };

    loop {
        tokio::select! {
            _ = wait_for_ctrl_c() => break,
            _ = terminate.recv() => break,
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, reloading rules");
                let _ = rules.reload().await;
            }
        }
    }

    tracing::info!("Termination signal received");
    shutdown.trigger();
}

/// Wait for Ctrl+C. Triggers `shutdown` before returning.
#[cfg(not(unix))]
pub async fn listen(_rules: RuleStore, shutdown: Shutdown) {
    wait_for_ctrl_c().await;
    tracing::info!("Termination signal received");
    shutdown.trigger();
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
