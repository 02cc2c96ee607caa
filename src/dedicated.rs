//! Bridge that owns one persistent worker thread.
//!
//! Callers block in [`DedicatedWorkerBridge::submit`] while their work item
//! runs on the worker. The item may finish asynchronously: the caller is only
//! released once the item fires its [`CompletionSignal`].
//!
//! Submissions are serialized through a three-state machine guarded by one
//! mutex/condvar pair. Completion is detected through a monotonic work
//! counter rather than through the state: by the time a caller wakes up, a
//! later submitter may already have moved the state back to
//! [`WorkerState::WorkAvailable`], so "state is `Waiting` again" does not mean
//! "my work finished". Each caller instead takes a unique ticket when it
//! installs its item and waits for the completion counter to move past it.
//! The worker finishes one item before picking up the next, so tickets
//! complete in order.

use crate::completion::{CompletionSignal, WorkItem};
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::metrics::{BridgeMetrics, MetricsSnapshot};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// State of the dedicated worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No work assigned; a new item may be installed.
    Waiting,
    /// An item has been installed and not yet picked up by the worker.
    WorkAvailable,
    /// The bridge is being dropped; the worker must exit.
    ShouldExit,
}

struct Inner {
    state: WorkerState,
    work: Option<(WorkItem, u64)>,
    // next ticket handed to a submitter
    submitted: u64,
    // bumped once per finished item; all tickets below it are done
    work_count: u64,
    // ticket of the last item that panicked on the worker
    panicked: Option<u64>,
}

struct Shared {
    inner: Mutex<Inner>,
    cond: Condvar,
    metrics: BridgeMetrics,
}

impl Shared {
    fn wait_for_work_slot(&self, inner: &mut MutexGuard<'_, Inner>) {
        while inner.state != WorkerState::Waiting {
            self.cond.wait(inner);
        }
    }

    fn assign_work(&self, inner: &mut MutexGuard<'_, Inner>, work: WorkItem) -> u64 {
        debug_assert_eq!(inner.state, WorkerState::Waiting);
        let work_id = inner.submitted;
        inner.submitted += 1;
        inner.work = Some((work, work_id));
        inner.state = WorkerState::WorkAvailable;
        work_id
    }

    fn wait_for_completion(&self, inner: &mut MutexGuard<'_, Inner>, work_id: u64) {
        // Other submitters may be parked on the same condvar, so wake everyone
        // to make sure the worker sees the new item.
        self.cond.notify_all();
        while inner.work_count <= work_id {
            self.cond.wait(inner);
        }
    }

    /// Block the worker until `work_id` has been resumed, or until exit is requested.
    fn wait_until_resumed(&self, work_id: u64) {
        let mut inner = self.inner.lock();
        while inner.work_count <= work_id && inner.state != WorkerState::ShouldExit {
            self.cond.wait(&mut inner);
        }
    }

    /// Mark `work_id` finished. Stale calls for an id that was already
    /// finished are ignored.
    fn finish(&self, work_id: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.work_count != work_id {
            return false;
        }
        inner.work_count += 1;
        self.cond.notify_all();
        true
    }

    /// Record that `work_id` panicked, then release its submitter.
    fn abandon(&self, work_id: u64) {
        self.inner.lock().panicked = Some(work_id);
        self.finish(work_id);
    }

    fn completion_signal(self: &Arc<Self>, work_id: u64) -> CompletionSignal {
        let shared = Arc::clone(self);
        CompletionSignal::new(move || {
            if shared.finish(work_id) {
                tracing::trace!(work_id, "work item resumed");
            }
        })
    }

    /// Wait for an item to be installed. Returns `None` on exit.
    fn next_work(&self) -> Option<(WorkItem, u64)> {
        let mut inner = self.inner.lock();
        loop {
            let state = inner.state;
            match state {
                WorkerState::ShouldExit => return None,
                WorkerState::WorkAvailable => {
                    let work = inner.work.take();

                    // The item is ours now; let the next submitter install.
                    inner.state = WorkerState::Waiting;
                    self.cond.notify_all();

                    match work {
                        Some(work) => return Some(work),
                        None => continue,
                    }
                }
                WorkerState::Waiting => self.cond.wait(&mut inner),
            }
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    tracing::debug!("dedicated worker started");

    while let Some((work, work_id)) = shared.next_work() {
        let signal = shared.completion_signal(work_id);

        // Run outside the lock so the item may block or resume from elsewhere.
        match catch_unwind(AssertUnwindSafe(move || work(signal))) {
            Ok(()) => shared.wait_until_resumed(work_id),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(work_id, %message, "work item panicked on dedicated worker");
                shared.metrics.record_panic();
                // Release the submitter; a late fire from the lost signal is ignored.
                shared.abandon(work_id);
            }
        }
    }

    tracing::debug!("dedicated worker exiting");
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A bridge with its own worker thread.
///
/// Safe to share between threads; concurrent [`submit`](Self::submit) calls
/// are serialized and each caller wakes on its own item's completion.
///
/// The bridge must not be dropped while a submission is in flight, and a
/// work item must not submit to the bridge it is running on.
pub struct DedicatedWorkerBridge {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl DedicatedWorkerBridge {
    pub fn new() -> Result<Self> {
        Self::with_config(&BridgeConfig::default())
    }

    /// Spawn the worker. It starts in [`WorkerState::Waiting`], so work can be
    /// submitted before the thread has actually been scheduled.
    pub fn with_config(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: WorkerState::Waiting,
                work: None,
                submitted: 0,
                work_count: 0,
                panicked: None,
            }),
            cond: Condvar::new(),
            metrics: BridgeMetrics::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let thread = config
            .thread_builder()
            .spawn(move || worker_loop(worker_shared))
            .map_err(Error::spawn)?;

        tracing::debug!(thread = %config.thread_name, "dedicated bridge created");

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Run `work` on the worker and block until it fires its signal.
    pub fn submit(&self, work: WorkItem) {
        let start = Instant::now();
        let shared = &self.shared;

        let mut inner = shared.inner.lock();
        shared.wait_for_work_slot(&mut inner);
        let work_id = shared.assign_work(&mut inner, work);
        shared.metrics.record_submitted();
        tracing::trace!(work_id, "work item installed");

        shared.wait_for_completion(&mut inner, work_id);
        let panicked = inner.panicked == Some(work_id);
        drop(inner);

        // Panicked items are counted by the worker instead.
        if !panicked {
            shared.metrics.record_completed(start.elapsed());
        }
    }

    /// [`submit`](Self::submit) for an unboxed closure.
    pub fn run<F>(&self, work: F)
    where
        F: FnOnce(CompletionSignal) + Send + 'static,
    {
        self.submit(Box::new(work));
    }

    pub fn state(&self) -> WorkerState {
        self.shared.inner.lock().state
    }

    /// Number of work items finished so far, including ones that panicked.
    pub fn completed_count(&self) -> u64 {
        self.shared.inner.lock().work_count
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl std::fmt::Debug for DedicatedWorkerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("DedicatedWorkerBridge")
            .field("state", &inner.state)
            .field("work_count", &inner.work_count)
            .finish()
    }
}

impl Drop for DedicatedWorkerBridge {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();

        // Nothing may be racing with us to submit more work.
        debug_assert_eq!(
            inner.state,
            WorkerState::Waiting,
            "bridge dropped with work outstanding"
        );

        inner.state = WorkerState::ShouldExit;
        self.shared.cond.notify_all();
        drop(inner);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("dedicated worker terminated abnormally");
            }
        }
    }
}
