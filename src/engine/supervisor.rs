// src/engine/supervisor.rs

//! Runner session supervisor.
//!
//! A session is the lifetime from the first `update` (which spawns the runner)
//! to `kill`. During a session there is exactly one temporary directory with
//! one `watch` file in it, and at most one live runner process. The runner is
//! started with `--watch-file <tmp>/watch` and reloads the extension whenever
//! that file changes; every later `update` just rewrites it.
//!
//! ```text
//!   Idle ──update──► Running ──update──► Running (watch file rewritten)
//!    │                  │
//!    └──────kill────────┴──────► Killed (terminal; updates become no-ops)
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{RunnerConfig, Settings};
use crate::engine::queue::{TaskHandle, TaskQueue};
use crate::errors::{Result, SupervisorError};
use crate::exec::args::{RunnerMode, build_args, run_args};
use crate::exec::launcher::{ExitSummary, Invocation, Launcher, ProcessHandle, ProcessLauncher};

/// Name of the reload-signal file inside the session directory.
pub const WATCH_FILE_NAME: &str = "watch";

/// Owns one runner session and mediates "the bundle changed" notifications.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    /// One-way latch, set at the very start of `kill`.
    killed: AtomicBool,
    /// Only touched from queued update tasks and from `kill`.
    session: Mutex<Session>,
    queue: TaskQueue,
    launcher: Arc<dyn Launcher>,
    runner: RunnerConfig,
    teardown_errors: StdMutex<Vec<String>>,
}

#[derive(Default)]
struct Session {
    tmp: Option<TempDir>,
    process: Option<Box<dyn ProcessHandle>>,
    /// Last value written to the watch file, in ms since the Unix epoch.
    last_stamp: u128,
}

impl Session {
    fn watch_path(&self) -> Option<PathBuf> {
        self.tmp.as_ref().map(|t| t.path().join(WATCH_FILE_NAME))
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("killed", &self.is_killed())
            .field("queue", &self.inner.queue)
            .field("runner", &self.inner.runner)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(runner: RunnerConfig, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                killed: AtomicBool::new(false),
                session: Mutex::new(Session::default()),
                queue: TaskQueue::new(),
                launcher,
                runner,
                teardown_errors: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Supervisor spawning real processes.
    pub fn with_process_launcher(runner: RunnerConfig) -> Self {
        Self::new(runner, Arc::new(ProcessLauncher))
    }

    pub fn is_killed(&self) -> bool {
        self.inner.killed.load(Ordering::SeqCst)
    }

    /// Signal that the bundle was (re)written.
    ///
    /// Queued behind any earlier update; never runs inline. The first update
    /// of a session spawns the runner, later ones rewrite the watch file.
    /// After `kill` the queued task does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn update(&self, settings: Settings) -> TaskHandle<()> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .submit(async move { inner.apply_update(settings).await })
    }

    /// Start a one-shot packaging build.
    ///
    /// Not queued and not part of the session: no temporary directory, no
    /// watch file, and `kill` does not stop it. Returns `Ok(None)` once the
    /// supervisor has been killed. The exit status is logged when the runner
    /// finishes; the returned handle may be awaited or simply dropped.
    pub fn build(&self, settings: &Settings) -> Result<Option<OneShotBuild>> {
        if self.is_killed() {
            debug!("supervisor killed; skipping one-shot build");
            return Ok(None);
        }

        let args = build_args(settings)?;
        let invocation = Invocation::new(&self.inner.runner.binary, RunnerMode::Build, args);
        let mut process = self.inner.launcher.launch(&invocation)?;
        let pid = process.id();
        info!(?pid, "one-shot build started");

        let waiter = tokio::spawn(async move {
            let outcome = process.wait().await;
            match &outcome {
                Ok(summary) if summary.success => {
                    info!(?pid, "one-shot build finished");
                }
                Ok(summary) => {
                    warn!(?pid, exit_code = ?summary.code, "one-shot build failed");
                }
                Err(e) => {
                    error!(?pid, error = %e, "waiting for one-shot build failed");
                }
            }
            outcome
        });

        Ok(Some(OneShotBuild { pid, waiter }))
    }

    /// Tear the session down. Terminal: a second call is an error.
    ///
    /// Sets the killed latch first, then concurrently removes the session
    /// directory, terminates the runner and drains the update queue. Returns
    /// once all three are done. Session state is cleared whatever happened;
    /// the first failure is returned and every failure is kept in
    /// [`Supervisor::teardown_errors`].
    pub async fn kill(&self) -> Result<()> {
        if self.inner.killed.swap(true, Ordering::SeqCst) {
            return Err(SupervisorError::AlreadyKilled);
        }
        info!("tearing down runner session");

        let inner = &self.inner;
        let (tmp_res, process_res, flush_res) = tokio::join!(
            inner.cleanup_tmp(),
            inner.kill_process(),
            inner.queue.flush(),
        );

        {
            let mut session = inner.session.lock().await;
            session.tmp = None;
            session.process = None;
        }

        let mut first = None;
        for (step, res) in [
            ("remove session directory", tmp_res),
            ("terminate runner", process_res),
            ("flush update queue", flush_res),
        ] {
            if let Err(err) = res {
                error!(step, error = %err, "teardown step failed");
                inner.record_teardown_error(format!("{step}: {err}"));
                if first.is_none() {
                    first = Some(err);
                }
            }
        }

        match first {
            Some(err) => Err(err),
            None => {
                info!("runner session torn down");
                Ok(())
            }
        }
    }

    /// Failures recorded by `kill`, in step order.
    pub fn teardown_errors(&self) -> Vec<String> {
        self.inner
            .teardown_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Session directory, while a session is active.
    pub async fn session_dir(&self) -> Option<PathBuf> {
        let session = self.inner.session.lock().await;
        session.tmp.as_ref().map(|t| t.path().to_path_buf())
    }

    /// Whether a runner process is currently owned by the session.
    pub async fn has_process(&self) -> bool {
        self.inner.session.lock().await.process.is_some()
    }
}

impl Inner {
    fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    async fn apply_update(&self, settings: Settings) -> Result<()> {
        let mut session = self.session.lock().await;

        // Checked under the session lock: `kill` flips the latch before it
        // can take the lock, so a killed session is never (re)populated.
        if self.is_killed() {
            debug!("supervisor killed; ignoring update");
            return Ok(());
        }

        if session.process.is_none() {
            self.spawn(&mut session, &settings).await
        } else {
            let path = session.watch_path().ok_or_else(|| {
                anyhow!("session owns a runner process but has no session directory")
            })?;
            write_stamp(&mut session, &path).await?;
            debug!(watch_file = %path.display(), "signalled runner reload");
            Ok(())
        }
    }

    async fn spawn(&self, session: &mut Session, settings: &Settings) -> Result<()> {
        let prefix = self.runner.temp_prefix.clone();
        let tmp = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir()
        })
        .await
        .map_err(anyhow::Error::from)??;

        if session.tmp.is_some() {
            return Err(SupervisorError::TempDirAlreadySet);
        }
        let watch_file = tmp.path().join(WATCH_FILE_NAME);
        info!(dir = %tmp.path().display(), "created session directory");
        session.tmp = Some(tmp);

        if !self.is_killed() {
            write_stamp(session, &watch_file).await?;
        }

        if !self.is_killed() {
            let args = run_args(settings, &watch_file)?;
            if session.process.is_some() {
                return Err(SupervisorError::ProcessAlreadySet);
            }
            let invocation = Invocation::new(&self.runner.binary, RunnerMode::Run, args);
            let process = self.launcher.launch(&invocation)?;
            info!(pid = ?process.id(), watch_file = %watch_file.display(), "runner started");
            session.process = Some(process);
        }

        Ok(())
    }

    async fn cleanup_tmp(&self) -> Result<()> {
        let tmp = self.session.lock().await.tmp.take();
        let Some(tmp) = tmp else {
            return Ok(());
        };

        let path = tmp.path().to_path_buf();
        let res = remove_dir_tolerant(&path).await;
        // Dropping `TempDir` retries the removal and ignores errors.
        drop(tmp);
        if res.is_ok() {
            debug!(dir = %path.display(), "removed session directory");
        }
        res
    }

    async fn kill_process(&self) -> Result<()> {
        let process = self.session.lock().await.process.take();
        let Some(mut process) = process else {
            return Ok(());
        };

        let pid = process.id();
        info!(?pid, grace_ms = self.runner.kill_grace_ms, "terminating runner");
        process.terminate(self.runner.kill_grace()).await
    }

    fn record_teardown_error(&self, msg: String) {
        self.teardown_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg);
    }
}

/// Write a fresh timestamp, strictly greater than the previous one.
async fn write_stamp(session: &mut Session, path: &Path) -> Result<()> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let stamp = now.max(session.last_stamp + 1);

    tokio::fs::write(path, stamp.to_string()).await?;
    session.last_stamp = stamp;
    Ok(())
}

async fn remove_dir_tolerant(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Handle on a detached one-shot build.
#[derive(Debug)]
pub struct OneShotBuild {
    pid: Option<u32>,
    waiter: JoinHandle<Result<ExitSummary>>,
}

impl OneShotBuild {
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the build to finish.
    pub async fn wait(self) -> Result<ExitSummary> {
        self.waiter.await.map_err(anyhow::Error::from)?
    }
}
