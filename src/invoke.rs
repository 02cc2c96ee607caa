//! Turning callback-style remote calls into blocking calls that return a
//! [`StatusCode`].
//!
//! A remote call takes its own arguments followed by a [`CompletionSignal`]
//! and a [`StatusSlot`]. On every path it must write `Ok` or `Error` into the
//! slot and then fire the signal exactly once:
//!
//! ```no_run
//! use sync_bridge::prelude::*;
//!
//! fn log_line(line: String, resume: CompletionSignal, status: StatusSlot) {
//!     std::thread::spawn(move || {
//!         println!("{line}");
//!         resume.resume(&status, StatusCode::Ok);
//!     });
//! }
//!
//! let bridge = DedicatedWorkerBridge::new().unwrap();
//! let status = invoke_with(&bridge, log_line, "hello".to_string());
//! assert_eq!(status, StatusCode::Ok);
//! ```

use crate::completion::{CompletionSignal, WorkItem};
use crate::dedicated::DedicatedWorkerBridge;
use crate::shared::SharedQueueBridge;
use crate::status::{StatusCode, StatusSlot};
use std::sync::Arc;

/// A blocking executor for work items.
pub trait Bridge {
    /// Run `work` and block until it fires its signal.
    ///
    /// Returns `false` if the work could not be delivered to a worker, in
    /// which case it did not run.
    fn submit_work(&self, work: WorkItem) -> bool;
}

impl Bridge for DedicatedWorkerBridge {
    fn submit_work(&self, work: WorkItem) -> bool {
        self.submit(work);
        true
    }
}

impl Bridge for SharedQueueBridge {
    fn submit_work(&self, work: WorkItem) -> bool {
        self.submit(work)
    }
}

impl<B: Bridge + ?Sized> Bridge for &B {
    fn submit_work(&self, work: WorkItem) -> bool {
        (**self).submit_work(work)
    }
}

impl<B: Bridge + ?Sized> Bridge for Arc<B> {
    fn submit_work(&self, work: WorkItem) -> bool {
        (**self).submit_work(work)
    }
}

/// A remote procedure with its arguments already bound.
pub trait RemoteCall: Send + 'static {
    fn call(self, resume: CompletionSignal, status: StatusSlot);
}

impl<F> RemoteCall for F
where
    F: FnOnce(CompletionSignal, StatusSlot) + Send + 'static,
{
    fn call(self, resume: CompletionSignal, status: StatusSlot) {
        self(resume, status)
    }
}

/// Run `remote` through `bridge` and return its final status.
///
/// Yields [`StatusCode::NotStarted`] if the bridge could not deliver the call.
pub fn invoke<B, R>(bridge: &B, remote: R) -> StatusCode
where
    B: Bridge + ?Sized,
    R: RemoteCall,
{
    let status = StatusSlot::new();
    let slot = status.clone();

    let delivered = bridge.submit_work(Box::new(move |resume: CompletionSignal| {
        remote.call(resume, slot)
    }));
    if !delivered {
        return StatusCode::NotStarted;
    }

    status.load()
}

/// [`invoke`] for a function taking its arguments first, then the
/// completion pair.
pub fn invoke_with<B, F, A>(bridge: &B, func: F, args: A) -> StatusCode
where
    B: Bridge + ?Sized,
    F: FnOnce(A, CompletionSignal, StatusSlot) + Send + 'static,
    A: Send + 'static,
{
    invoke(bridge, move |resume: CompletionSignal, status: StatusSlot| {
        func(args, resume, status)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Task, TaskQueue};
    use std::thread;
    use std::time::Duration;

    fn succeed(resume: CompletionSignal, status: StatusSlot) {
        resume.resume(&status, StatusCode::Ok);
    }

    fn check_positive((a, b): (i32, i32), resume: CompletionSignal, status: StatusSlot) {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            let code = if a + b > 0 {
                StatusCode::Ok
            } else {
                StatusCode::Error
            };
            resume.resume(&status, code);
        });
    }

    #[test]
    fn test_invoke_ok() {
        let bridge = DedicatedWorkerBridge::new().unwrap();
        assert_eq!(invoke(&bridge, succeed), StatusCode::Ok);
    }

    #[test]
    fn test_invoke_with_args() {
        let bridge = DedicatedWorkerBridge::new().unwrap();

        assert_eq!(invoke_with(&bridge, check_positive, (2, 3)), StatusCode::Ok);
        assert_eq!(
            invoke_with(&bridge, check_positive, (-4, 1)),
            StatusCode::Error
        );
    }

    fn slow_ok(delay_ms: u64, resume: CompletionSignal, status: StatusSlot) {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(delay_ms));
            resume.resume(&status, StatusCode::Ok);
        });
    }

    #[test]
    fn test_overlapping_invokes_on_dedicated() {
        let bridge = Arc::new(DedicatedWorkerBridge::new().unwrap());

        let first = {
            let bridge = bridge.clone();
            thread::spawn(move || invoke_with(&*bridge, slow_ok, 300))
        };
        thread::sleep(Duration::from_millis(50));
        let second = invoke_with(&*bridge, slow_ok, 10);

        assert_eq!(first.join().unwrap(), StatusCode::Ok);
        assert_eq!(second, StatusCode::Ok);
    }

    #[test]
    fn test_invoke_shared_bridge() {
        let bridge = SharedQueueBridge::spawn().unwrap();
        assert_eq!(invoke_with(&bridge, check_positive, (1, 1)), StatusCode::Ok);
    }

    #[test]
    fn test_invoke_not_started() {
        struct Unreachable;

        impl TaskQueue for Unreachable {
            fn proxy_sync(&self, _task: Task) -> bool {
                false
            }
        }

        let bridge = SharedQueueBridge::new(Unreachable);
        assert_eq!(invoke(&bridge, succeed), StatusCode::NotStarted);
    }

    #[test]
    fn test_invoke_through_trait_object() {
        let bridges: Vec<Box<dyn Bridge>> = vec![
            Box::new(DedicatedWorkerBridge::new().unwrap()),
            Box::new(SharedQueueBridge::spawn().unwrap()),
        ];

        for bridge in &bridges {
            assert_eq!(invoke(bridge.as_ref(), succeed), StatusCode::Ok);
        }
    }
}
