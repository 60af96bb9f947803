//! Observability for tagvisor executors: tracing subscriber setup and a
//! listener that journals every task life-cycle event.

mod logger;
pub use logger::*;

mod listener;
pub use listener::*;
