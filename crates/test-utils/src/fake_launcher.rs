use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use webext_supervisor::errors::Result;
use webext_supervisor::exec::{BoxFuture, ExitSummary, Invocation, Launcher, ProcessHandle};

/// A fake launcher that:
/// - records every invocation instead of spawning anything
/// - hands out `FakeProcess` handles whose terminations are counted
/// - can be told to fail launches or terminations
/// - can hold the next launch until a test releases it.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    invocations: Vec<Invocation>,
    processes: Vec<Arc<FakeProcessStats>>,
    fail_launch: Option<String>,
    fail_terminate: bool,
    exit_code: i32,
    gate: Option<HeldLaunch>,
}

struct HeldLaunch {
    entered: Arc<AtomicBool>,
    release: mpsc::Receiver<()>,
}

/// Test-side end of [`FakeLauncher::hold_next_launch`].
#[derive(Debug)]
pub struct LaunchGate {
    entered: Arc<AtomicBool>,
    release: mpsc::Sender<()>,
}

impl LaunchGate {
    /// True once `launch` has been called and is blocked on this gate.
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    /// Wait (polling) until the held launch has started.
    pub async fn entered(&self) {
        while !self.is_entered() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// Let the held launch finish.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

/// Shared counters for one fake process.
#[derive(Debug, Default)]
pub struct FakeProcessStats {
    pub terminated: AtomicUsize,
    pub waited: AtomicUsize,
    pub last_grace: Mutex<Option<Duration>>,
}

impl FakeProcessStats {
    pub fn terminate_count(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following launch fails with `message`.
    pub fn fail_launches(&self, message: &str) {
        self.state.lock().unwrap().fail_launch = Some(message.to_string());
    }

    /// Every following `terminate` call fails (after being counted).
    pub fn fail_terminations(&self) {
        self.state.lock().unwrap().fail_terminate = true;
    }

    /// Block the next `launch` call (synchronously, on its worker thread)
    /// until the returned gate is released. Needs a multi-threaded runtime.
    pub fn hold_next_launch(&self) -> LaunchGate {
        let entered = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        self.state.lock().unwrap().gate = Some(HeldLaunch {
            entered: Arc::clone(&entered),
            release: rx,
        });
        LaunchGate {
            entered,
            release: tx,
        }
    }

    /// Exit code reported by `wait` on processes launched from now on.
    pub fn exit_with(&self, code: i32) {
        self.state.lock().unwrap().exit_code = code;
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().unwrap().invocations.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.state.lock().unwrap().invocations.len()
    }

    pub fn process(&self, index: usize) -> Arc<FakeProcessStats> {
        Arc::clone(&self.state.lock().unwrap().processes[index])
    }

    /// Terminations across all processes launched so far.
    pub fn terminate_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .processes
            .iter()
            .map(|p| p.terminate_count())
            .sum()
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, invocation: &Invocation) -> Result<Box<dyn ProcessHandle>> {
        let held = self.state.lock().unwrap().gate.take();
        if let Some(held) = held {
            held.entered.store(true, Ordering::SeqCst);
            // A dropped gate releases too.
            let _ = held.release.recv();
        }

        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_launch {
            return Err(anyhow::anyhow!("{message}").into());
        }

        state.invocations.push(invocation.clone());
        let stats = Arc::new(FakeProcessStats::default());
        state.processes.push(Arc::clone(&stats));

        Ok(Box::new(FakeProcess {
            pid: 10_000 + state.processes.len() as u32,
            stats,
            exit_code: state.exit_code,
            fail_terminate: state.fail_terminate,
        }))
    }
}

/// Process handle produced by [`FakeLauncher`].
pub struct FakeProcess {
    pid: u32,
    stats: Arc<FakeProcessStats>,
    exit_code: i32,
    fail_terminate: bool,
}

impl ProcessHandle for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn wait(&mut self) -> BoxFuture<'_, Result<ExitSummary>> {
        let code = self.exit_code;
        self.stats.waited.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(ExitSummary {
                code: Some(code),
                success: code == 0,
            })
        })
    }

    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, Result<()>> {
        self.stats.terminated.fetch_add(1, Ordering::SeqCst);
        *self.stats.last_grace.lock().unwrap() = Some(grace);
        let fail = self.fail_terminate;
        Box::pin(async move {
            if fail {
                Err(anyhow::anyhow!("fake terminate failure").into())
            } else {
                Ok(())
            }
        })
    }
}
