use crate::error::{Error, Result};

const MIN_STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub thread_name: String,
    pub stack_size: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            thread_name: "sync-bridge-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
        }
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_name.is_empty() {
            return Err(Error::config("thread_name must not be empty"));
        }
        if self.thread_name.contains('\0') {
            return Err(Error::config("thread_name must not contain NUL bytes"));
        }

        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(Error::config(format!(
                    "stack_size too small (min {} bytes)",
                    MIN_STACK_SIZE
                )));
            }
        }

        Ok(())
    }

    /// Thread builder for a worker described by this config.
    pub(crate) fn thread_builder(&self) -> std::thread::Builder {
        let mut builder = std::thread::Builder::new().name(self.thread_name.clone());
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder
    }
}

#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
        }
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Use the platform default stack size.
    pub fn default_stack_size(mut self) -> Self {
        self.config.stack_size = None;
        self
    }

    pub fn build(self) -> Result<BridgeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
