// src/engine/queue.rs

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{oneshot, watch};
use tracing::{debug, error, trace, warn};

use crate::errors::{Result, SupervisorError};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Identifies one run of the drain loop; doubles as the ownership token.
type DrainId = u64;

/// Ordered, single-flight task runner.
///
/// Semantics:
/// - Tasks run strictly one after another, in the order they were submitted.
/// - At most one drain loop exists at a time. It is started by the submit
///   call that finds the queue idle and it exits as soon as `pending` is
///   empty, returning the queue to idle.
/// - A task's outcome (including failure) is delivered only through the
///   [`TaskHandle`] returned by [`TaskQueue::submit`]; a failing or panicking
///   task never stops the tasks behind it.
/// - [`TaskQueue::flush`] waits for the active drain loop and then checks
///   that the queue really is idle.
///
/// Cloning yields another handle onto the same queue.
#[derive(Clone)]
pub struct TaskQueue {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<QueueState>,
    /// `true` while a drain loop is running. Flipped in the same critical
    /// section that sets/clears `QueueState::flushing`.
    draining: watch::Sender<bool>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    /// `None` = idle, `Some(id)` = drain loop `id` owns dequeuing.
    flushing: Option<DrainId>,
    next_drain: DrainId,
    /// First invariant violation detected by a drain loop, surfaced by `flush`.
    violation: Option<String>,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TaskQueue")
            .field("pending", &state.pending.len())
            .field("flushing", &state.flushing)
            .finish_non_exhaustive()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        let (draining, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                draining,
            }),
        }
    }

    /// Append `task` and make sure a drain loop is running.
    ///
    /// Never blocks and never runs `task` inline. Must be called from within
    /// a Tokio runtime, since the drain loop is a spawned task.
    ///
    /// Dropping the returned handle does not cancel the task.
    pub fn submit<Fut, T>(&self, task: Fut) -> TaskHandle<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let outcome = task.await;
            if tx.send(outcome).is_err() {
                trace!("task outcome discarded: handle was dropped");
            }
        });

        // Push and the "who starts the drain loop" decision are one atomic step.
        let start = {
            let mut state = self.lock();
            state.pending.push_back(job);
            if state.flushing.is_none() {
                let id = state.next_drain;
                state.next_drain += 1;
                state.flushing = Some(id);
                self.shared.draining.send_replace(true);
                Some(id)
            } else {
                None
            }
        };

        if let Some(id) = start {
            tokio::spawn(drain(Arc::clone(&self.shared), id));
        }

        TaskHandle { rx }
    }

    /// Wait for the active drain loop (if any), then assert the queue is idle.
    ///
    /// Submissions racing with `flush` are a caller error; they show up as an
    /// `Invalid pending state` / `Invalid flushing state` violation.
    pub async fn flush(&self) -> Result<()> {
        let mut rx = self.shared.draining.subscribe();
        rx.wait_for(|draining| !*draining)
            .await
            .map(|_| ())
            .map_err(|_| SupervisorError::QueueInvariant("drain state channel closed".into()))?;

        let state = self.lock();
        if let Some(violation) = &state.violation {
            return Err(SupervisorError::QueueInvariant(violation.clone()));
        }
        if !state.pending.is_empty() {
            return Err(SupervisorError::QueueInvariant(format!(
                "Invalid pending state: {} task(s) still queued after flush",
                state.pending.len()
            )));
        }
        if let Some(id) = state.flushing {
            return Err(SupervisorError::QueueInvariant(format!(
                "Invalid flushing state: drain loop {id} still active after flush"
            )));
        }
        Ok(())
    }

    /// True when no drain loop is running and nothing is queued.
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.flushing.is_none() && state.pending.is_empty()
    }

    /// Number of tasks waiting to be dequeued (excludes the running one).
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared.lock()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The drain loop: the only place tasks leave `pending`.
async fn drain(shared: Arc<Shared>, id: DrainId) {
    debug!(drain = id, "drain loop started");

    loop {
        let next = {
            let mut state = shared.lock();
            match state.pending.pop_front() {
                Some(job) => job,
                None => {
                    // Observing emptiness and releasing ownership happen under
                    // the same lock, so no submit can slip in between.
                    release(&mut state, id);
                    shared.draining.send_replace(false);
                    break;
                }
            }
        };

        // Each task runs on its own Tokio task so a panic is contained to it;
        // its handle then resolves to `TaskDropped`.
        if let Err(err) = tokio::spawn(next).await {
            warn!(drain = id, error = %err, "queued task panicked; continuing with the next one");
        }
    }

    debug!(drain = id, "drain loop finished; queue idle");
}

fn release(state: &mut QueueState, id: DrainId) {
    match state.flushing {
        Some(owner) if owner == id => state.flushing = None,
        other => {
            let msg =
                format!("Invalid flushing state: drain loop {id} exited but token was {other:?}");
            error!(drain = id, "{msg}");
            state.violation.get_or_insert(msg);
        }
    }
}

/// Future resolving to a submitted task's own outcome.
#[must_use = "dropping the handle discards the task outcome (the task still runs)"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or_else(|_| Err(SupervisorError::TaskDropped)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn fresh_queue_is_idle_and_flushes() {
        let queue = TaskQueue::new();
        assert!(queue.is_idle());
        queue.flush().await.unwrap();
    }

    #[tokio::test]
    async fn handle_resolves_with_task_value() {
        let queue = TaskQueue::new();
        let value = queue.submit(async { Ok(41 + 1) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn failure_goes_only_to_its_own_handle() {
        let queue = TaskQueue::new();
        let failing = queue.submit(async { Err::<(), _>(anyhow::anyhow!("boom").into()) });
        let ok = queue.submit(async { Ok("after") });

        let err = failing.await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(ok.await.unwrap(), "after");
        queue.flush().await.unwrap();
    }

    #[tokio::test]
    async fn panicking_task_reports_dropped_and_queue_continues() {
        let queue = TaskQueue::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let panicking = queue.submit(async {
            if true {
                panic!("task blew up");
            }
            Ok(())
        });
        let counter = Arc::clone(&ran);
        let after = queue.submit(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(matches!(panicking.await, Err(SupervisorError::TaskDropped)));
        after.await.unwrap();
        queue.flush().await.unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flush_waits_for_slow_task() {
        let queue = TaskQueue::new();
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);

        let _handle = queue.submit(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(!queue.is_idle());
        queue.flush().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(queue.is_idle());
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn release_with_foreign_token_records_violation() {
        let mut state = QueueState {
            flushing: Some(7),
            ..QueueState::default()
        };
        release(&mut state, 3);
        assert_eq!(state.flushing, Some(7));
        assert!(state.violation.as_deref().unwrap().contains("drain loop 3"));
    }
}
