//! # Inbound Ports (Driving Ports / API)
//!
//! Call/return interface over the message-based workers.

use crate::domain::errors::OffloadError;
use crate::domain::messages::{HashJob, HashOutput, JobOutput};
use crate::domain::password::Password;
use futures::future::BoxFuture;
use std::time::Duration;

/// Primary hash offload API.
///
/// `submit` does its bookkeeping before returning: the request id is
/// allocated, the pending entry registered and the frame dispatched by the
/// time the future is handed back. Awaiting the future only waits for the
/// matching response.
pub trait HashOffloadApi: Send + Sync {
    /// Submit a job, optionally bounded by `deadline`.
    ///
    /// When `deadline` is `None` the configured default applies (if any).
    fn submit(
        &self,
        job: HashJob,
        deadline: Option<Duration>,
    ) -> BoxFuture<'static, Result<JobOutput, OffloadError>>;

    /// Hash `password` at cost `rounds` with a random salt.
    fn hash(
        &self,
        password: Password,
        rounds: u32,
    ) -> BoxFuture<'static, Result<HashOutput, OffloadError>> {
        let reply = self.submit(HashJob::hash(password, rounds), None);
        Box::pin(async move { reply.await?.into_hash() })
    }

    /// Check `password` against an encoded bcrypt hash.
    fn verify(
        &self,
        password: Password,
        hash: String,
    ) -> BoxFuture<'static, Result<bool, OffloadError>> {
        let reply = self.submit(HashJob::verify(password, hash), None);
        Box::pin(async move { reply.await?.into_verified() })
    }
}
