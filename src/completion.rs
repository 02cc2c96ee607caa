//! One-shot completion handles handed to work items.

use crate::error::Result;
use crate::status::{StatusCode, StatusSlot};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// A unit of work run on a bridge's worker thread.
///
/// The item owns the [`CompletionSignal`] it is given and must fire it exactly
/// once, either before returning or later from any thread.
pub type WorkItem = Box<dyn FnOnce(CompletionSignal) + Send + 'static>;

/// Single-use handle that tells a bridge its work item is done.
///
/// Firing consumes the handle, so a signal can never be fired twice. The
/// signal carries no payload; results travel through a [`StatusSlot`] written
/// beforehand (see [`CompletionSignal::resume`]).
pub struct CompletionSignal {
    notify: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl CompletionSignal {
    pub fn new<F>(notify: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            notify: Some(Box::new(notify)),
        }
    }

    /// Fire the signal, waking whoever is waiting on this work item.
    pub fn complete(mut self) {
        if let Some(notify) = self.notify.take() {
            notify();
        }
    }

    /// Write `status` into `slot`, then fire.
    pub fn resume(self, slot: &StatusSlot, status: StatusCode) {
        slot.write(status);
        self.complete();
    }

    /// Foreign-boundary variant of [`resume`](Self::resume) taking a raw code.
    ///
    /// An unknown code is recorded as `Error` and the signal still fires, so
    /// the waiting caller is released; the bad code is returned as an error.
    pub fn resume_raw(self, slot: &StatusSlot, raw: i32) -> Result<()> {
        match StatusCode::try_from(raw) {
            Ok(status) => {
                self.resume(slot, status);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(raw, "remote side reported an unknown status code");
                self.resume(slot, StatusCode::Error);
                Err(err)
            }
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        if self.notify.is_some() {
            tracing::warn!("completion signal dropped without firing; its caller stays blocked");
        }
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("fired", &self.notify.is_none())
            .finish()
    }
}

/// Per-call wait point: a flag plus condition variable private to one
/// submission.
#[derive(Debug, Default)]
pub(crate) struct Latch {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A signal that opens this latch when fired.
    pub(crate) fn signal(self: &Arc<Self>) -> CompletionSignal {
        let latch = Arc::clone(self);
        CompletionSignal::new(move || {
            *latch.done.lock() = true;
            latch.cond.notify_one();
        })
    }

    pub(crate) fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        *self.done.lock()
    }
}
