//! # Domain Layer
//!
//! Message contract, bcrypt primitive, pending table and configuration.
//! No threads or channels live here.

pub mod config;
pub mod errors;
pub mod hashing;
pub mod messages;
pub mod password;
pub mod pending;
pub mod request_id;

pub use config::{ConfigError, OffloadConfig};
pub use errors::{CodecError, HashingError, OffloadError, TransportError};
pub use messages::{
    HashJob, HashOutput, HashParams, HashRequest, HashResponse, HashVariant, JobKind, JobOutput,
    VerifyParams,
};
pub use password::Password;
pub use pending::{PendingRequestTable, PendingSnapshot, PendingStats, Settlement};
pub use request_id::{RequestId, RequestIdAllocator};
