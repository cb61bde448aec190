//! Signal handling.

use tokio::sync::watch;
use tracing::{info, warn};

/// Spawns a task that flips the returned receiver to `true` on the first
/// SIGINT or SIGTERM.
pub fn listen() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal, "shutdown signal received");
        // Receivers may already be gone if the pool exited on its own.
        let _ = tx.send(true);
    });
    rx
}

/// Resolves once shutdown was requested. The `watch::Ref` read guard is
/// released before returning.
pub async fn requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "cannot listen for SIGTERM; only SIGINT stops the process");
            return ctrl_c().await;
        }
    };
    tokio::select! {
        name = ctrl_c() => name,
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for SIGINT");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
