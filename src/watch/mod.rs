// src/watch/mod.rs

//! File watching for the standalone host.
//!
//! When the binary runs in `--watch` mode it plays the part of the bundler:
//! every debounced burst of changes under the source directory counts as
//! "a bundle was written" and is turned into a `HostEvent`.

pub mod watcher;

pub use watcher::{DEFAULT_DEBOUNCE, WatcherHandle, is_relevant, spawn_watcher};
