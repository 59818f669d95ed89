// Allow missing docs for internal items in development
#![allow(missing_docs)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! DevKit Hash Offload - bcrypt work moved off the caller's execution context.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    HASH OFFLOAD (devkit-hash-offload)             │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐        ┌───────────────────────────────────┐   │
//! │  │  HashFacade  │──────► │        HashOffloadService         │   │
//! │  │ (watch views)│        │  id allocator · pending table     │   │
//! │  └──────────────┘        └────────────┬──────────────▲───────┘   │
//! │                                       │ JSON frames  │           │
//! │                          ┌────────────▼──────────────┴───────┐   │
//! │                          │   WorkerPool (round-robin)        │   │
//! │                          │   worker-0 · worker-1 · ...       │   │
//! │                          │   one OS thread, FIFO inbox each  │   │
//! │                          └───────────────────────────────────┘   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers get a future per submission. Workers see only serialized
//! requests carrying a `requestId` and answer with a serialized response
//! echoing it. The correlator matches the two and settles the future.
//!
//! # Example
//!
//! ```no_run
//! use devkit_hash_offload::{HashOffloadApi, HashOffloadService, OffloadConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = HashOffloadService::new(OffloadConfig::default())?;
//! let output = service.hash("test123".into(), 10).await?;
//! assert!(service.verify("test123".into(), output.hash).await?);
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod domain;
pub mod facade;
pub mod ports;
pub mod service;

pub use adapters::{ThreadPoolBackend, WorkerPool, WorkerRuntime};
pub use domain::*;
pub use facade::{HashFacade, HashViewState, VerifyViewState, ViewStatus};
pub use ports::inbound::HashOffloadApi;
pub use ports::outbound::{ResponseSink, WorkerBackend, WorkerTransport};
pub use service::{HashOffloadService, ResponseListener};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
