// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::host::HostEvent;

/// Quiet period after the last filesystem event before a rebuild is reported.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and send one `HostEvent::BundleWritten` per burst
/// of changes, once `debounce` has passed without further events.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    debounce: Duration,
    host_tx: mpsc::Sender<HostEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_relevant(&event) && event_tx.send(event).is_err() {
                    eprintln!("webext-supervisor: failed to forward notify event");
                }
            }
            Err(err) => {
                eprintln!("webext-supervisor: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    tokio::spawn(async move {
        while let Some(first) = event_rx.recv().await {
            trace!(?first, "change burst started");
            let mut changes = 1usize;

            // Swallow everything that arrives within the quiet period.
            loop {
                match tokio::time::timeout(debounce, event_rx.recv()).await {
                    Ok(Some(_)) => changes += 1,
                    Ok(None) => {
                        debug!("notify channel closed during debounce");
                        return;
                    }
                    Err(_) => break,
                }
            }

            debug!(changes, "bundle directory changed");
            if host_tx.send(HostEvent::BundleWritten).await.is_err() {
                debug!("host runtime gone; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Only content and structure changes count; plain reads do not.
pub fn is_relevant(event: &Event) -> bool {
    !matches!(event.kind, EventKind::Access(_) | EventKind::Other)
}
