use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Resolves on SIGTERM or SIGINT (Ctrl+C elsewhere).
pub async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(())
    }
}

/// Spawn a watcher that cancels `token` once a shutdown signal arrives.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(()) => tracing::info!("shutdown: signal received"),
            Err(e) => tracing::warn!(error = %e, "shutdown: signal listener failed"),
        }
        token.cancel();
    });
}
