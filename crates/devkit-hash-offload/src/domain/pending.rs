//! Pending Request Table - maps request ids to waiting callers.
//!
//! Each entry is removed exactly once: when its response arrives, when it
//! is rejected, when its deadline passes, or when the service shuts down.

use crate::domain::errors::OffloadError;
use crate::domain::messages::{HashOutput, HashResponse, JobKind, JobOutput};
use crate::domain::request_id::RequestId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// What a waiting caller eventually receives.
pub type Settlement = Result<JobOutput, OffloadError>;

/// A request waiting for its worker response
struct PendingRequest {
    /// Channel to settle the caller's future
    sender: oneshot::Sender<Settlement>,
    /// When the request was registered
    created_at: Instant,
    /// Kind of job submitted, checked against the response kind
    kind: JobKind,
}

/// Statistics for the pending request table
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests resolved with a result
    pub total_completed: AtomicU64,
    /// Total requests rejected (worker failure, transport, shutdown)
    pub total_failed: AtomicU64,
    /// Total requests that hit their deadline
    pub total_timeouts: AtomicU64,
    /// Total requests whose caller stopped waiting
    pub total_cancelled: AtomicU64,
}

impl PendingStats {
    /// Plain snapshot of the counters.
    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            registered: self.total_registered.load(Ordering::Relaxed),
            completed: self.total_completed.load(Ordering::Relaxed),
            failed: self.total_failed.load(Ordering::Relaxed),
            timeouts: self.total_timeouts.load(Ordering::Relaxed),
            cancelled: self.total_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub failed: u64,
    pub timeouts: u64,
    pub cancelled: u64,
}

/// Pending request table for async-to-message bridging.
///
/// Flow:
/// 1. Correlator allocates a `RequestId`
/// 2. Correlator calls `register()` to get a oneshot receiver
/// 3. Correlator sends the tagged request to a worker
/// 4. Response listener decodes the reply and calls `settle()`
/// 5. Caller awaits the receiver or gives up at its deadline
pub struct PendingRequestTable {
    /// Map of request id to pending request
    pending: DashMap<RequestId, PendingRequest>,
    /// Registration refused at this many live entries
    max_pending: usize,
    /// Live entries plus in-progress registrations, bounded by `max_pending`
    reserved: AtomicUsize,
    /// Statistics
    stats: PendingStats,
}

impl PendingRequestTable {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: DashMap::new(),
            max_pending,
            reserved: AtomicUsize::new(0),
            stats: PendingStats::default(),
        }
    }

    /// Register a pending request and get a receiver for its settlement.
    pub fn register(
        &self,
        request_id: RequestId,
        kind: JobKind,
    ) -> Result<oneshot::Receiver<Settlement>, OffloadError> {
        // Claim a slot before inserting so concurrent registrations can
        // never push the table past its limit.
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.max_pending).then_some(live + 1)
            })
            .map_err(|_| OffloadError::Overloaded {
                limit: self.max_pending,
            })?;

        let (tx, rx) = oneshot::channel();
        match self.pending.entry(request_id) {
            Entry::Occupied(_) => {
                self.reserved.fetch_sub(1, Ordering::AcqRel);
                return Err(OffloadError::Transport(format!(
                    "request id {} is already pending",
                    request_id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    sender: tx,
                    created_at: Instant::now(),
                    kind,
                });
            }
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(request_id = %request_id, kind = %kind, "Registered pending request");
        Ok(rx)
    }

    /// Route a worker response to its waiting caller.
    ///
    /// Returns false when no entry matches. Unknown ids are stale or
    /// duplicate replies (e.g. after a timeout) and are dropped without
    /// touching the table.
    pub fn settle(&self, response: HashResponse) -> bool {
        let request_id = response.request_id();
        let Some(pending) = self.take(request_id) else {
            debug!(request_id = %request_id, "Discarding response for unknown or expired request");
            return false;
        };

        let settlement = into_settlement(pending.kind, response);
        if settlement.is_ok() {
            self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.deliver(request_id, pending, settlement)
    }

    /// Reject a pending request with `error`.
    pub fn reject(&self, request_id: RequestId, error: OffloadError) -> bool {
        let Some(pending) = self.take(request_id) else {
            return false;
        };
        self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
        self.deliver(request_id, pending, Err(error))
    }

    /// Remove an entry whose deadline passed.
    pub fn expire(&self, request_id: RequestId) -> bool {
        if let Some(pending) = self.take(request_id) {
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            debug!(
                request_id = %request_id,
                kind = %pending.kind,
                elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
                "Pending request timed out"
            );
            true
        } else {
            false
        }
    }

    /// Remove an entry without settling it.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        if self.take(request_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Reject every live entry. Used on shutdown.
    pub fn fail_all(&self, error: &OffloadError) -> usize {
        let ids: Vec<RequestId> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.reject(*id, error.clone()))
            .count()
    }

    /// Get number of currently pending requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a request id is pending
    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }

    /// Get statistics
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    /// Remove an entry and release its slot.
    fn take(&self, request_id: RequestId) -> Option<PendingRequest> {
        let (_, pending) = self.pending.remove(&request_id)?;
        self.reserved.fetch_sub(1, Ordering::AcqRel);
        Some(pending)
    }

    fn deliver(&self, request_id: RequestId, pending: PendingRequest, settlement: Settlement) -> bool {
        let waited: Duration = pending.created_at.elapsed();
        match pending.sender.send(settlement) {
            Ok(()) => {
                debug!(
                    request_id = %request_id,
                    kind = %pending.kind,
                    waited_ms = waited.as_millis() as u64,
                    "Settled pending request"
                );
                true
            }
            Err(_) => {
                // Caller dropped its future before the reply arrived
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %request_id, "Pending request receiver dropped");
                false
            }
        }
    }
}

fn into_settlement(expected: JobKind, response: HashResponse) -> Settlement {
    match response {
        HashResponse::HashResult {
            result,
            compute_time_ms,
            ..
        } if expected == JobKind::Hash => Ok(JobOutput::Hashed(HashOutput {
            hash: result,
            compute_time_ms,
        })),
        HashResponse::VerifyResult { result, .. } if expected == JobKind::Verify => {
            Ok(JobOutput::Verified(result))
        }
        HashResponse::Failure { request_id, error } => Err(OffloadError::Worker {
            request_id,
            message: error,
        }),
        HashResponse::HashResult { .. } => Err(OffloadError::UnexpectedResponse {
            expected,
            actual: JobKind::Hash,
        }),
        HashResponse::VerifyResult { .. } => Err(OffloadError::UnexpectedResponse {
            expected,
            actual: JobKind::Verify,
        }),
    }
}
