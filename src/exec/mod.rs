// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`args`] builds the argument vectors for the runner's `run` and `build`
//!   subcommands.
//! - [`launcher`] provides the `Launcher` / `ProcessHandle` traits and the
//!   `tokio::process` backed `ProcessLauncher` used in production, which
//!   tests can replace with a fake implementation.

pub mod args;
pub mod launcher;

pub use args::{RunnerMode, build_args, resolve_dir, run_args};
pub use launcher::{
    BoxFuture, ChildProcess, ExitSummary, Invocation, Launcher, ProcessHandle, ProcessLauncher,
};
