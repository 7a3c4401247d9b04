//! Deferred one-shot tasks
//!
//! The copy shortcut and the error cooldown both need "run this later"
//! semantics without blocking the thread that asked. Jobs are queued on a
//! tokio runtime: the delay is an async sleep, the job itself runs on the
//! blocking pool because it may sit in an HTTP call for up to a minute.
//!
//! On shutdown, jobs still waiting out their delay are aborted; jobs that
//! already started can only be waited for, with a bound. Once closed, the
//! scheduler drops new jobs, including ones queued by a job still running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

struct DeferredTask {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

/// Tracks deferred jobs on a runtime
pub struct Scheduler {
    runtime: Handle,
    tasks: Mutex<Vec<DeferredTask>>,
    closed: AtomicBool,
}

impl Scheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Runtime the jobs are spawned on
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<DeferredTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `job` on the blocking pool once `delay` has elapsed.
    ///
    /// Returns immediately. Does nothing once the scheduler is closed.
    pub fn schedule<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            tracing::debug!("Scheduler closed, dropping deferred task");
            return;
        }

        let started = Arc::new(AtomicBool::new(false));
        let started_flag = started.clone();

        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            started_flag.store(true, Ordering::SeqCst);
            if let Err(e) = tokio::task::spawn_blocking(job).await {
                tracing::error!("Deferred task failed: {}", e);
            }
        });

        let mut tasks = self.tasks();
        tasks.retain(|task| !task.handle.is_finished());
        tasks.push(DeferredTask { handle, started });
    }

    /// Stop accepting jobs and abort the ones still waiting.
    ///
    /// Returns the number of aborted jobs.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel_pending()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Abort every job that is still waiting for its delay.
    ///
    /// Returns the number of aborted jobs. Jobs already running are left
    /// alone.
    pub fn cancel_pending(&self) -> usize {
        let mut tasks = self.tasks();
        let mut cancelled = 0;
        tasks.retain(|task| {
            if task.handle.is_finished() {
                return false;
            }
            if task.started.load(Ordering::SeqCst) {
                return true;
            }
            task.handle.abort();
            cancelled += 1;
            false
        });
        if cancelled > 0 {
            tracing::debug!("Cancelled {} pending deferred task(s)", cancelled);
        }
        cancelled
    }

    /// Wait for running jobs, giving up after `timeout`.
    ///
    /// Returns true if everything finished in time. Must be called from
    /// outside the runtime.
    pub fn join(&self, timeout: Duration) -> bool {
        let tasks: Vec<DeferredTask> = std::mem::take(&mut *self.tasks());
        if tasks.is_empty() {
            return true;
        }

        tracing::debug!("Waiting for {} background task(s)...", tasks.len());
        self.runtime.block_on(async move {
            let all = async {
                for task in tasks {
                    let _ = task.handle.await;
                }
            };
            tokio::time::timeout(timeout, all).await.is_ok()
        })
    }
}
