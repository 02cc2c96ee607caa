//! sync-bridge - blocking calls over asynchronous work
//!
//! Lets a thread make a plain blocking call whose work actually runs on
//! another thread and may finish at some arbitrary later point. The work is
//! handed a one-shot [`CompletionSignal`]; firing it wakes the blocked caller.
//!
//! # Quick Start
//!
//! ```no_run
//! use sync_bridge::prelude::*;
//!
//! let bridge = DedicatedWorkerBridge::new().unwrap();
//!
//! let status = invoke(&bridge, |resume: CompletionSignal, status: StatusSlot| {
//!     std::thread::spawn(move || {
//!         // ... finish some asynchronous work ...
//!         resume.resume(&status, StatusCode::Ok);
//!     });
//! });
//!
//! assert_eq!(status, StatusCode::Ok);
//! ```
//!
//! # Bridges
//!
//! - [`DedicatedWorkerBridge`]: owns one worker thread; any number of callers
//!   may submit concurrently and each wakes on its own completion.
//! - [`SharedQueueBridge`]: routes calls through one long-lived worker behind
//!   an injectable [`TaskQueue`], and reports [`StatusCode::NotStarted`]
//!   instead of blocking when the worker cannot be reached.
//!
//! A work item that never fires its signal leaves its caller blocked forever.
//! Neither bridge may be dropped while a call is in flight.

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod completion;
pub mod config;
pub mod dedicated;
pub mod error;
pub mod invoke;
pub mod metrics;
pub mod prelude;
pub mod queue;
pub mod registry;
pub mod shared;
pub mod status;

// Re-export key types at crate root
pub use completion::{CompletionSignal, WorkItem};
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use dedicated::{DedicatedWorkerBridge, WorkerState};
pub use error::{Error, Result};
pub use invoke::{invoke, invoke_with, Bridge, RemoteCall};
pub use queue::{ProxyingQueue, TaskQueue};
pub use registry::{OpHandle, PendingOps};
pub use shared::SharedQueueBridge;
pub use status::{StatusCode, StatusSlot};
