use globalping_orchestrator::CooperativeCancellationToken;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Cancels `token` on SIGINT or SIGTERM. Abort the handle once the run ends.
pub(crate) fn spawn_interrupt_listener(token: CooperativeCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_interrupt().await;
        debug!("interrupt received; cancelling measurement");
        token.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => report_listener_failure(result).await,
                _ = terminate.recv() => {}
            }
        }
        Err(error) => {
            warn!(%error, "failed to install SIGTERM handler");
            report_listener_failure(tokio::signal::ctrl_c().await).await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    report_listener_failure(tokio::signal::ctrl_c().await).await;
}

// A listener that cannot be installed must never look like an interrupt.
async fn report_listener_failure(result: std::io::Result<()>) {
    if let Err(error) = result {
        warn!(%error, "failed to listen for interrupts");
        std::future::pending::<()>().await;
    }
}
