//! # Adapters Layer
//!
//! Concrete worker transport: JSON framing, the worker runtime and the
//! thread pool that hosts it.

pub mod codec;
pub mod pool;
pub mod worker;

pub use pool::{ThreadPoolBackend, WorkerPool};
pub use worker::WorkerRuntime;
