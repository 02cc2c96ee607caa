//! Task queues that proxy work onto a long-lived worker thread.

use crate::config::BridgeConfig;
use crate::dedicated::panic_message;
use crate::error::{Error, Result};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// A closure proxied onto a queue's target thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run a task on a specific target thread.
pub trait TaskQueue: Send + Sync {
    /// Run `task` on the target thread and block until it has returned there.
    ///
    /// Returns `false` when the task was not accepted or did not run to
    /// completion, e.g. because the target is unreachable.
    fn proxy_sync(&self, task: Task) -> bool;

    /// Stop the target thread without draining queued tasks.
    fn cancel(&self) {}
}

struct Proxied {
    task: Task,
    ack: Sender<bool>,
}

/// Default [`TaskQueue`]: one worker thread fed through a channel.
pub struct ProxyingQueue {
    tasks: Mutex<Option<Sender<Proxied>>>,
    cancel_tx: Mutex<Option<Sender<()>>>,
    cancelled: Arc<AtomicBool>,
    worker_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ProxyingQueue {
    pub fn new() -> Result<Self> {
        Self::with_config(&BridgeConfig::default())
    }

    pub fn with_config(config: &BridgeConfig) -> Result<Self> {
        config.validate()?;

        let (tasks_tx, tasks_rx) = unbounded();
        let (cancel_tx, cancel_rx) = bounded(1);
        let cancelled = Arc::new(AtomicBool::new(false));

        let cancelled_clone = cancelled.clone();
        let thread = config
            .thread_builder()
            .spawn(move || run_queue(tasks_rx, cancel_rx, cancelled_clone))
            .map_err(Error::spawn)?;

        tracing::debug!(thread = %config.thread_name, "proxying queue started");

        Ok(Self {
            tasks: Mutex::new(Some(tasks_tx)),
            cancel_tx: Mutex::new(Some(cancel_tx)),
            cancelled,
            worker_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn is_running(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
    }
}

fn run_queue(tasks: Receiver<Proxied>, cancel: Receiver<()>, cancelled: Arc<AtomicBool>) {
    loop {
        select! {
            recv(tasks) -> msg => {
                let Ok(proxied) = msg else { break };
                if cancelled.load(Ordering::Acquire) {
                    break;
                }

                let ran = match catch_unwind(AssertUnwindSafe(proxied.task)) {
                    Ok(()) => true,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!(%message, "proxied task panicked");
                        false
                    }
                };
                let _ = proxied.ack.send(ran);
            }
            recv(cancel) -> _ => break,
        }
    }

    tracing::debug!("proxying queue worker exiting");
}

impl TaskQueue for ProxyingQueue {
    fn proxy_sync(&self, task: Task) -> bool {
        if thread::current().id() == self.worker_id {
            // Already on the target; queueing would wait on ourselves.
            return catch_unwind(AssertUnwindSafe(task)).is_ok();
        }

        let (ack_tx, ack_rx) = bounded(1);
        {
            let tasks = self.tasks.lock();
            let Some(tasks) = tasks.as_ref() else {
                return false;
            };
            if tasks.send(Proxied { task, ack: ack_tx }).is_err() {
                return false;
            }
        }

        // A dropped ack means the worker went away before running the task.
        ack_rx.recv().unwrap_or(false)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.tasks.lock().take();
        self.cancel_tx.lock().take();

        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        if thread::current().id() == self.worker_id {
            return;
        }
        if thread.join().is_err() {
            tracing::error!("proxying queue worker terminated abnormally");
        }
    }
}

impl Drop for ProxyingQueue {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ProxyingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyingQueue")
            .field("running", &self.is_running())
            .field("worker_id", &self.worker_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_proxy_runs_on_worker() {
        let queue = ProxyingQueue::new().unwrap();
        let seen = Arc::new(Mutex::new(None));

        let s = seen.clone();
        assert!(queue.proxy_sync(Box::new(move || {
            *s.lock() = Some(thread::current().id());
        })));

        assert_eq!(*seen.lock(), Some(queue.worker_id));
        assert_ne!(*seen.lock(), Some(thread::current().id()));
    }

    #[test]
    fn test_proxy_is_synchronous() {
        let queue = ProxyingQueue::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let c = count.clone();
            assert!(queue.proxy_sync(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })));
        }

        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_cancelled_queue_rejects() {
        let queue = ProxyingQueue::new().unwrap();
        queue.cancel();

        assert!(!queue.is_running());
        assert!(!queue.proxy_sync(Box::new(|| {})));
    }

    #[test]
    fn test_panicking_task_reports_not_run() {
        let queue = ProxyingQueue::new().unwrap();
        assert!(!queue.proxy_sync(Box::new(|| panic!("boom"))));

        // worker keeps serving
        assert!(queue.proxy_sync(Box::new(|| {})));
    }
}
