//! Plain data types shared by the tagvisor crates.
//!
//! Nothing here owns threads or locks: these are the values that flow through
//! the executor (states, tags, identifiers, life-cycle events) and the
//! configuration used to build one.

mod config;
pub use config::ExecutorConfig;

mod domain;
pub use domain::*;

mod error;
pub use error::ConfigError;
