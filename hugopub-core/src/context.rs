//! Explicit runtime context handed to every component.

use crate::batch::BatchRunner;
use crate::config::{Config, ConfigError};
use std::sync::Arc;

/// Resolved configuration plus the shared batch runner.
///
/// Cloning is cheap; clones share the same runner budget.
#[derive(Debug, Clone)]
pub struct Context {
    config: Arc<Config>,
    runner: BatchRunner,
}

impl Context {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let runner = BatchRunner::new(config.workers);
        Ok(Self {
            config: Arc::new(config),
            runner,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &BatchRunner {
        &self.runner
    }
}
