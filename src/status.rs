//! Outcome codes reported back across the worker boundary.

use crate::error::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Three-valued outcome of a bridged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    /// The remote work ran and succeeded.
    Ok = 0,
    /// The remote work ran and reported failure.
    Error = 1,
    /// The work was never delivered to a worker, so it definitely did not run.
    NotStarted = 2,
}

impl StatusCode {
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// True once the remote side has produced a result.
    pub fn is_finished(self) -> bool {
        matches!(self, StatusCode::Ok | StatusCode::Error)
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::NotStarted
    }
}

impl TryFrom<i32> for StatusCode {
    type Error = crate::error::Error;

    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(StatusCode::Ok),
            1 => Ok(StatusCode::Error),
            2 => Ok(StatusCode::NotStarted),
            other => Err(Error::InvalidStatus(other)),
        }
    }
}

impl From<StatusCode> for i32 {
    fn from(status: StatusCode) -> Self {
        status.as_raw()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "ok",
            StatusCode::Error => "error",
            StatusCode::NotStarted => "not started",
        };
        f.write_str(name)
    }
}

/// Shared status cell written by the remote side before it fires its
/// completion signal.
///
/// Cloning yields another handle to the same cell. A fresh slot holds
/// [`StatusCode::NotStarted`].
#[derive(Debug, Clone)]
pub struct StatusSlot {
    raw: Arc<AtomicI32>,
}

impl StatusSlot {
    pub fn new() -> Self {
        Self {
            raw: Arc::new(AtomicI32::new(StatusCode::NotStarted.as_raw())),
        }
    }

    pub fn write(&self, status: StatusCode) {
        self.raw.store(status.as_raw(), Ordering::Release);
    }

    /// Store a raw code as received from a foreign caller.
    ///
    /// Values outside `0..=2` are rejected and leave the slot untouched.
    pub fn write_raw(&self, raw: i32) -> Result<()> {
        let status = StatusCode::try_from(raw)?;
        self.write(status);
        Ok(())
    }

    pub fn raw(&self) -> i32 {
        self.raw.load(Ordering::Acquire)
    }

    pub fn load(&self) -> StatusCode {
        let raw = self.raw();
        StatusCode::try_from(raw).unwrap_or_else(|_| {
            tracing::warn!(raw, "status slot holds an unknown code, treating as error");
            StatusCode::Error
        })
    }

    /// Put the slot back to `NotStarted`.
    pub fn reset(&self) {
        self.write(StatusCode::NotStarted);
    }
}

impl Default for StatusSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_codes() {
        assert_eq!(StatusCode::Ok.as_raw(), 0);
        assert_eq!(StatusCode::Error.as_raw(), 1);
        assert_eq!(StatusCode::NotStarted.as_raw(), 2);

        assert_eq!(StatusCode::try_from(1).unwrap(), StatusCode::Error);
        assert!(matches!(
            StatusCode::try_from(7),
            Err(Error::InvalidStatus(7))
        ));
    }

    #[test]
    fn test_finished() {
        assert!(StatusCode::Ok.is_finished());
        assert!(StatusCode::Error.is_finished());
        assert!(!StatusCode::NotStarted.is_finished());
    }

    #[test]
    fn test_slot_starts_not_started() {
        let slot = StatusSlot::new();
        assert_eq!(slot.load(), StatusCode::NotStarted);

        let other = slot.clone();
        other.write(StatusCode::Ok);
        assert_eq!(slot.load(), StatusCode::Ok);

        slot.reset();
        assert_eq!(other.load(), StatusCode::NotStarted);
    }

    #[test]
    fn test_slot_rejects_unknown_raw() {
        let slot = StatusSlot::new();
        slot.write_raw(1).unwrap();
        assert_eq!(slot.load(), StatusCode::Error);

        assert!(slot.write_raw(-3).is_err());
        assert_eq!(slot.raw(), 1);
    }
}
