// src/host.rs

//! Event loop that plays the bundler's part for the standalone binary.
//!
//! Events come from the file watcher and the shutdown signal listener; the
//! loop turns them into plugin hook calls. Tests drive it directly through
//! the event channel.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::plugin::{BundleOutcome, WebextPlugin};

/// Events flowing into the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The bundle directory was (re)written.
    BundleWritten,
    /// Ctrl-C / SIGTERM or an explicit stop.
    ShutdownRequested,
}

pub struct HostRuntime {
    plugin: WebextPlugin,
    event_rx: mpsc::Receiver<HostEvent>,
    watch_mode: bool,
}

impl fmt::Debug for HostRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRuntime")
            .field("plugin", &self.plugin)
            .field("watch_mode", &self.watch_mode)
            .finish_non_exhaustive()
    }
}

impl HostRuntime {
    pub fn new(
        plugin: WebextPlugin,
        event_rx: mpsc::Receiver<HostEvent>,
        watch_mode: bool,
    ) -> Self {
        Self {
            plugin,
            event_rx,
            watch_mode,
        }
    }

    /// Main event loop.
    ///
    /// Runs until a shutdown is requested, every sender is gone, or a hook
    /// fails, then closes the plugin's watch session exactly once.
    pub async fn run(mut self) -> Result<()> {
        info!(watch_mode = self.watch_mode, "host runtime started");

        let mut outcome = Ok(());
        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "host received event");
            match event {
                HostEvent::BundleWritten => {
                    if let Err(err) = self.on_bundle_written() {
                        error!(error = %err, "bundle hook failed; closing session");
                        outcome = Err(err);
                        break;
                    }
                }
                HostEvent::ShutdownRequested => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        // The session is closed on every exit path; a hook failure wins
        // over a teardown failure.
        let closed = self.plugin.close_watcher().await;
        outcome?;
        closed?;
        info!("host runtime exiting");
        Ok(())
    }

    fn on_bundle_written(&self) -> Result<()> {
        match self.plugin.write_bundle(None, self.watch_mode)? {
            BundleOutcome::Reload(handle) => {
                // Nothing upstream awaits reloads; surface failures in the log.
                tokio::spawn(async move {
                    if let Err(err) = handle.await {
                        error!(error = %err, "runner update failed");
                    }
                });
            }
            BundleOutcome::Build(Some(build)) => {
                debug!(pid = ?build.id(), "one-shot build detached");
            }
            BundleOutcome::Build(None) => {}
        }
        Ok(())
    }
}
