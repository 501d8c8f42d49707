//! Shutdown signalling shared by both listeners.

use std::future::Future;
use tokio::sync::watch;

/// Spawn a task that flips the returned receiver to `true` once `signal`
/// completes. If the signal cannot be listened for, the sender is kept alive
/// so the listeners keep serving instead of shutting down immediately.
pub fn spawn_shutdown_listener<F>(signal: F) -> watch::Receiver<bool>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal.await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });
    shutdown_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_triggers_shutdown() {
        let mut rx = spawn_shutdown_listener(async { Ok(()) });

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("shutdown not signalled")
            .unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_failed_signal_keeps_listeners_running() {
        let mut rx = spawn_shutdown_listener(async {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal handler"))
        });

        let waited = tokio::time::timeout(Duration::from_millis(100), rx.changed()).await;
        assert!(waited.is_err(), "shutdown resolved after signal failure");
        assert!(!*rx.borrow());
    }
}
