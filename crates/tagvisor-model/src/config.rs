use std::{num::NonZeroUsize, time::Duration};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const DEFAULT_THREAD_NAME: &str = "tagvisor-worker";
const DEFAULT_KEEP_ALIVE_MS: u64 = 10_000;

/// Worker pool configuration of a task executor.
///
/// Every field has a default, so a partial document deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorConfig {
    /// Maximum number of threads running task bodies and listener callbacks.
    pub workers: usize,
    /// Name given to pool threads.
    pub thread_name: String,
    /// How long an idle pool thread lingers before exiting.
    pub keep_alive_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            keep_alive_ms: DEFAULT_KEEP_ALIVE_MS,
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_keep_alive_ms(mut self, ms: u64) -> Self {
        self.keep_alive_ms = ms;
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = ExecutorConfig::default();
        assert!(cfg.workers >= 1);
        assert_eq!(cfg.thread_name, "tagvisor-worker");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let cfg = ExecutorConfig::new().with_workers(0);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroWorkers));
    }

    #[test]
    fn blank_thread_name_rejected() {
        let cfg = ExecutorConfig::new().with_thread_name("  ");
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyThreadName));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: ExecutorConfig = serde_json::from_str(r#"{"workers":3}"#).unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.thread_name, "tagvisor-worker");
        assert_eq!(cfg.keep_alive(), Duration::from_secs(10));
    }

    #[test]
    fn camel_case_fields() {
        let cfg: ExecutorConfig =
            serde_json::from_str(r#"{"threadName":"io","keepAliveMs":5}"#).unwrap();
        assert_eq!(cfg.thread_name, "io");
        assert_eq!(cfg.keep_alive_ms, 5);
    }
}
