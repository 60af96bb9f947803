use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker pool must have at least one thread")]
    ZeroWorkers,
    #[error("worker thread name must not be empty")]
    EmptyThreadName,
}
