pub use crate::completion::{CompletionSignal, WorkItem};
pub use crate::config::{BridgeConfig, BridgeConfigBuilder};
pub use crate::dedicated::DedicatedWorkerBridge;
pub use crate::error::{Error, Result};
pub use crate::invoke::{invoke, invoke_with, Bridge, RemoteCall};
pub use crate::queue::TaskQueue;
pub use crate::shared::SharedQueueBridge;
pub use crate::status::{StatusCode, StatusSlot};
