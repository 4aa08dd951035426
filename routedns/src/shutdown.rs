//! Graceful shutdown: waits for `SIGINT`/`SIGTERM`/`SIGHUP` (or
//! `Ctrl+C` on platforms without `SIGTERM`), then returns so `main` can
//! stop accepting new connections and let in-flight queries drain.

use log::info;

/// Resolve once an operator-requested shutdown signal arrives.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut hup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
        let ctrl_c = tokio::signal::ctrl_c();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = term.recv() => info!("received SIGTERM, shutting down"),
            _ = hup.recv() => info!("received SIGHUP, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received Ctrl+C, shutting down");
    }
}
