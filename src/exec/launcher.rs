// src/exec/launcher.rs

//! Pluggable process launcher abstraction.
//!
//! The supervisor talks to a `Launcher` instead of `tokio::process` directly.
//! Production code uses [`ProcessLauncher`]; tests provide a fake that records
//! invocations and hands out controllable process handles.

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::args::RunnerMode;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A fully resolved runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub mode: RunnerMode,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>, mode: RunnerMode, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
            mode,
        }
    }

    /// Args as lossy UTF-8 strings, for logs and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

/// How a runner process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSummary {
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
}

/// A live runner process.
pub trait ProcessHandle: Send {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit on its own.
    fn wait(&mut self) -> BoxFuture<'_, Result<ExitSummary>>;

    /// Stop the process: ask politely, wait up to `grace`, then force it.
    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, Result<()>>;
}

/// Trait abstracting how the runner binary is started.
pub trait Launcher: Send + Sync {
    /// Start the process described by `invocation`.
    ///
    /// Stdin must be disabled; stdout/stderr are forwarded to ours.
    fn launch(&self, invocation: &Invocation) -> Result<Box<dyn ProcessHandle>>;
}

/// Real launcher used in production, backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, invocation: &Invocation) -> Result<Box<dyn ProcessHandle>> {
        info!(
            program = %invocation.program.to_string_lossy(),
            mode = invocation.mode.subcommand(),
            args = ?invocation.args_lossy(),
            "starting runner process"
        );

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "spawning '{}' in {} mode",
                    invocation.program.to_string_lossy(),
                    invocation.mode.subcommand()
                )
            })?;

        Ok(Box::new(ChildProcess { child }))
    }
}

/// [`ProcessHandle`] over a real child process.
pub struct ChildProcess {
    child: Child,
}

impl fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildProcess")
            .field("pid", &self.child.id())
            .finish()
    }
}

impl ProcessHandle for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn wait(&mut self) -> BoxFuture<'_, Result<ExitSummary>> {
        Box::pin(async move {
            let status = self
                .child
                .wait()
                .await
                .context("waiting for runner process")?;
            Ok(ExitSummary {
                code: status.code(),
                success: status.success(),
            })
        })
    }

    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(terminate_child(&mut self.child, grace))
    }
}

async fn terminate_child(child: &mut Child, grace: Duration) -> Result<()> {
    if let Some(status) = child.try_wait()? {
        debug!(exit_code = ?status.code(), "runner already exited; nothing to terminate");
        return Ok(());
    }

    if !grace.is_zero() && send_sigterm(child) {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => {
                let status = status.context("waiting for runner after SIGTERM")?;
                info!(exit_code = ?status.code(), "runner exited after SIGTERM");
                return Ok(());
            }
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "runner ignored SIGTERM within grace period; killing"
                );
            }
        }
    }

    match child.kill().await {
        Ok(()) => {
            info!("runner killed");
            Ok(())
        }
        // Exited between the checks above and the kill.
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        Err(e) => Err(anyhow::Error::new(e).context("killing runner process").into()),
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(id) = child.id() else {
        return false;
    };

    match kill(Pid::from_raw(id as i32), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            warn!(pid = id, error = %e, "failed to send SIGTERM to runner");
            false
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}
