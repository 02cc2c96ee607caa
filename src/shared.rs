//! Bridge that routes every call through one shared, long-lived worker.
//!
//! Spawning a worker per call is expensive and can exhaust the host's thread
//! pool when calls come in quick succession. [`SharedQueueBridge`] instead
//! proxies each work item onto a single worker owned by a [`TaskQueue`]. The
//! proxy step is synchronous and reports whether the item actually started,
//! so a caller never waits on work that was never delivered.

use crate::completion::{CompletionSignal, Latch, WorkItem};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::metrics::{BridgeMetrics, MetricsSnapshot};
use crate::queue::{ProxyingQueue, TaskQueue};
use std::sync::OnceLock;
use std::time::Instant;

static GLOBAL_BRIDGE: OnceLock<SharedQueueBridge> = OnceLock::new();

pub struct SharedQueueBridge {
    queue: Box<dyn TaskQueue>,
    metrics: BridgeMetrics,
}

impl SharedQueueBridge {
    /// Wrap an existing queue.
    pub fn new<Q>(queue: Q) -> Self
    where
        Q: TaskQueue + 'static,
    {
        Self {
            queue: Box::new(queue),
            metrics: BridgeMetrics::new(),
        }
    }

    /// Bridge over a freshly spawned [`ProxyingQueue`].
    pub fn spawn() -> Result<Self> {
        Self::with_config(&BridgeConfig::default())
    }

    pub fn with_config(config: &BridgeConfig) -> Result<Self> {
        Ok(Self::new(ProxyingQueue::with_config(config)?))
    }

    /// Process-wide bridge, created on first use.
    ///
    /// Prefer constructing a bridge and passing it down; this exists for call
    /// sites with no better owner. The global bridge is never torn down.
    pub fn global() -> Result<&'static SharedQueueBridge> {
        if let Some(bridge) = GLOBAL_BRIDGE.get() {
            return Ok(bridge);
        }

        // A racing initializer may win; ours is then dropped and its worker joined.
        let bridge = Self::spawn()?;
        Ok(GLOBAL_BRIDGE.get_or_init(|| bridge))
    }

    /// Run `work` on the shared worker and block until it fires its signal.
    ///
    /// Returns `false` without blocking if the queue did not start the work.
    pub fn submit(&self, work: WorkItem) -> bool {
        let start = Instant::now();
        self.metrics.record_submitted();

        let latch = Latch::new();
        let signal = latch.signal();
        let accepted = self.queue.proxy_sync(Box::new(move || work(signal)));

        if !accepted {
            tracing::warn!("shared worker did not start the work item");
            self.metrics.record_rejected();
            return false;
        }

        latch.wait();
        self.metrics.record_completed(start.elapsed());
        true
    }

    /// [`submit`](Self::submit) for an unboxed closure.
    pub fn run<F>(&self, work: F) -> bool
    where
        F: FnOnce(CompletionSignal) + Send + 'static,
    {
        self.submit(Box::new(work))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for SharedQueueBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedQueueBridge")
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl Drop for SharedQueueBridge {
    fn drop(&mut self) {
        // Abort: queued items are discarded and in-flight items are not awaited.
        tracing::debug!("cancelling shared worker");
        self.queue.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Task;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Unreachable;

    impl TaskQueue for Unreachable {
        fn proxy_sync(&self, _task: Task) -> bool {
            false
        }
    }

    struct CountingQueue {
        inner: ProxyingQueue,
        cancels: Arc<AtomicUsize>,
    }

    impl TaskQueue for CountingQueue {
        fn proxy_sync(&self, task: Task) -> bool {
            self.inner.proxy_sync(task)
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            self.inner.cancel();
        }
    }

    #[test]
    fn test_submit_sync_completion() {
        let bridge = SharedQueueBridge::spawn().unwrap();
        let ran = Arc::new(AtomicBool::new(false));

        let r = ran.clone();
        assert!(bridge.run(move |signal| {
            r.store(true, Ordering::SeqCst);
            signal.complete();
        }));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_submit_waits_for_late_signal() {
        let bridge = SharedQueueBridge::spawn().unwrap();
        let start = Instant::now();

        assert!(bridge.run(|signal| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                signal.complete();
            });
        }));

        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_unreachable_queue_returns_immediately() {
        let bridge = SharedQueueBridge::new(Unreachable);

        assert!(!bridge.run(|signal| signal.complete()));

        let snapshot = bridge.metrics();
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.completed, 0);
    }

    #[test]
    fn test_drop_cancels_queue() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let bridge = SharedQueueBridge::new(CountingQueue {
            inner: ProxyingQueue::new().unwrap(),
            cancels: cancels.clone(),
        });

        assert!(bridge.run(|signal| signal.complete()));
        drop(bridge);

        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_global_is_created_once() {
        let a = SharedQueueBridge::global().unwrap();
        let b = SharedQueueBridge::global().unwrap();
        assert!(std::ptr::eq(a, b));

        assert!(a.run(|signal| signal.complete()));
    }
}
