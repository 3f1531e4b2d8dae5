// src/signals.rs

//! Cross-platform shutdown signal handling.
//!
//! **Unix:** `SIGINT` (Ctrl-C) and `SIGTERM`.
//! **Windows:** Ctrl-C via [`tokio::signal::ctrl_c`].

/// Completes when the process receives a termination signal.
///
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = sigterm.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
