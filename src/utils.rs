use std::fmt;

use tokio::signal;
use tracing::{error, warn};

/// What ended the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    CtrlC,
    Terminate,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CtrlC => f.write_str("Ctrl+C"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Resolve on Ctrl+C or SIGTERM; used with `axum::serve(..).with_graceful_shutdown`.
///
/// A handler that cannot be installed is logged and never fires, so the other
/// signal still stops the server.
pub async fn shutdown_signal() {
    let reason = wait_for_signal().await;
    warn!(signal = %reason, "Shutdown signal received, draining connections...");
}

async fn wait_for_signal() -> ShutdownReason {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => ShutdownReason::CtrlC,
        () = terminate => ShutdownReason::Terminate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_reason_display() {
        assert_eq!(ShutdownReason::CtrlC.to_string(), "Ctrl+C");
        assert_eq!(ShutdownReason::Terminate.to_string(), "SIGTERM");
    }
}
