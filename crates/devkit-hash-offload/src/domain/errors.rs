//! # Offload Errors
//!
//! Error types for the worker runtime, the transport and the correlator.

use crate::domain::messages::JobKind;
use crate::domain::request_id::RequestId;
use std::time::Duration;
use thiserror::Error;

/// Errors a caller of the correlator can observe.
///
/// Every variant settles exactly one submission. None of them leave the
/// correlator unusable, except `ShutDown`, which is permanent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OffloadError {
    /// The worker answered with a failure (bad cost, bad salt, ...).
    #[error("worker failed request {request_id}: {message}")]
    Worker {
        request_id: RequestId,
        message: String,
    },

    /// No response arrived before the deadline.
    #[error("request {request_id} timed out after {}ms", .after.as_millis())]
    Timeout {
        request_id: RequestId,
        after: Duration,
    },

    /// The request or its response could not cross the worker boundary.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response kind does not match the submitted job.
    #[error("unexpected response: expected {expected} result, got {actual}")]
    UnexpectedResponse { expected: JobKind, actual: JobKind },

    /// Too many submissions are waiting for workers.
    #[error("too many pending requests (limit {limit})")]
    Overloaded { limit: usize },

    /// Submitting requires a Tokio runtime to host the response listener.
    #[error("no async runtime available to start the hash workers")]
    NoRuntime,

    /// The service was shut down before the request settled.
    #[error("hash offload service is shut down")]
    ShutDown,
}

impl OffloadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, OffloadError::Timeout { .. })
    }
}

/// Errors raised by the bcrypt primitive inside a worker.
///
/// These never cross the boundary as values; the worker turns them into
/// `Failure` responses carrying the display text.
#[derive(Debug, Error)]
pub enum HashingError {
    #[error("Invalid cost: {rounds} (must be between {min} and {max})")]
    InvalidCost { rounds: u32, min: u32, max: u32 },

    #[error("Invalid salt: {0}")]
    InvalidSalt(String),

    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Errors moving frames between the correlator and the workers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("worker channel closed")]
    ChannelClosed,

    #[error("no workers available")]
    NoWorkers,

    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

impl From<TransportError> for OffloadError {
    fn from(err: TransportError) -> Self {
        OffloadError::Transport(err.to_string())
    }
}

/// Errors encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<CodecError> for OffloadError {
    fn from(err: CodecError) -> Self {
        OffloadError::Transport(err.to_string())
    }
}
