//! Table of pending operations addressed by plain integer handles.
//!
//! Some boundaries can only carry a number. A work item parks its signal and
//! status slot here and passes the handle across; the far side later calls
//! [`PendingOps::resume`] with that handle and a raw status code.

use crate::completion::CompletionSignal;
use crate::error::{Error, Result};
use crate::status::StatusSlot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpHandle(u64);

impl OpHandle {
    pub fn from_raw(raw: u64) -> Self {
        OpHandle(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct PendingOps {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, (CompletionSignal, StatusSlot)>>,
}

impl PendingOps {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Park a signal and its status slot until resumed.
    pub fn register(&self, signal: CompletionSignal, status: StatusSlot) -> OpHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(id, (signal, status));
        OpHandle(id)
    }

    /// Write `raw` into the operation's slot and fire its signal.
    ///
    /// Each handle resumes at most once; later calls fail with
    /// [`Error::UnknownHandle`].
    pub fn resume(&self, handle: OpHandle, raw: i32) -> Result<()> {
        let entry = self.pending.lock().remove(&handle.0);
        let (signal, status) = entry.ok_or(Error::UnknownHandle(handle.0))?;
        signal.resume_raw(&status, raw)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingOps {
    fn default() -> Self {
        Self::new()
    }
}
