//! Signal handling for graceful shutdown

use signal_hook_tokio::Signals;
use futures::stream::StreamExt;
use tracing::{info, warn};

/// Wait for a shutdown signal (SIGTERM, SIGINT) and return its number.
///
/// If the signal handler cannot be installed, only Ctrl-C is honoured.
pub async fn shutdown_signal() -> i32 {
    let mut signals = match Signals::new([
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
    ]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Failed to install signal handler, falling back to Ctrl-C: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to wait for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            return signal_hook::consts::SIGINT;
        }
    };

    match signals.next().await {
        Some(signal) => {
            info!("Received signal: {}", signal);
            signal
        }
        None => std::future::pending().await,
    }
}
