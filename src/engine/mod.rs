// src/engine/mod.rs

//! Runner supervision engine.
//!
//! - [`queue`] is the ordered, single-flight task queue. It knows nothing
//!   about runners; it only guarantees in-order, non-overlapping execution
//!   and lets callers wait for a full drain.
//! - [`supervisor`] owns one runner session (temporary directory, watch file,
//!   at most one child process) and serializes `update` requests through the
//!   queue so a spawn never races a watch-file rewrite.

pub mod queue;
pub mod supervisor;

pub use queue::{TaskHandle, TaskQueue};
pub use supervisor::{OneShotBuild, Supervisor, WATCH_FILE_NAME};
