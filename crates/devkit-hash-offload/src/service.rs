//! # Hash Offload Service
//!
//! The request correlator. Bridges the message-based workers to a
//! future-returning API and owns the worker lifecycle.
//!
//! ## Request Lifecycle
//!
//! ```text
//! submit() ── allocate id ── register ── dispatch ──► worker thread
//!    │                                                     │
//!    ▼                                                     ▼
//! future ◄── settle(id) ◄── ResponseListener ◄── serialized response
//! ```
//!
//! A request is `Sent` once dispatched and ends `Resolved`, `Rejected` or
//! `TimedOut`. Every terminal state removes the pending entry; a response
//! arriving afterwards finds no entry and is dropped.

use crate::adapters::codec;
use crate::adapters::pool::ThreadPoolBackend;
use crate::domain::config::{ConfigError, OffloadConfig};
use crate::domain::errors::OffloadError;
use crate::domain::messages::{HashJob, JobOutput};
use crate::domain::pending::{PendingRequestTable, PendingStats, Settlement};
use crate::domain::request_id::{RequestId, RequestIdAllocator};
use crate::ports::inbound::HashOffloadApi;
use crate::ports::outbound::{WorkerBackend, WorkerTransport};
use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long shutdown waits for the listener to drain queued responses.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

enum Lifecycle {
    Idle,
    Running(Running),
    Stopped,
}

struct Running {
    transport: Box<dyn WorkerTransport>,
    listener: JoinHandle<()>,
}

/// Request correlator and worker owner.
pub struct HashOffloadService {
    config: OffloadConfig,
    ids: RequestIdAllocator,
    pending: Arc<PendingRequestTable>,
    backend: Arc<dyn WorkerBackend>,
    lifecycle: Mutex<Lifecycle>,
}

impl HashOffloadService {
    /// Create a service backed by OS worker threads. Workers start on
    /// `start()` or on the first submission.
    pub fn new(config: OffloadConfig) -> Result<Self, ConfigError> {
        let backend = Arc::new(ThreadPoolBackend::from_config(&config));
        Self::with_backend(config, backend)
    }

    /// Create a service with a custom worker backend.
    pub fn with_backend(
        config: OffloadConfig,
        backend: Arc<dyn WorkerBackend>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let pending = Arc::new(PendingRequestTable::new(config.max_pending));
        Ok(Self {
            config,
            ids: RequestIdAllocator::new(),
            pending,
            backend,
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    /// Start the workers and the response listener.
    ///
    /// Idempotent while running. Must be called within a Tokio runtime.
    pub fn start(&self) -> Result<(), OffloadError> {
        let mut lifecycle = self.lifecycle.lock();
        self.ensure_running(&mut lifecycle).map(|_| ())
    }

    /// Stop the workers and reject whatever is still pending.
    ///
    /// Waits for each worker to finish its in-flight job; jobs still queued
    /// are skipped and their callers get `ShutDown`, as do submissions made
    /// afterwards.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);

        if let Lifecycle::Running(Running {
            transport,
            mut listener,
        }) = previous
        {
            transport.close().await;
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut listener).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Response listener ended abnormally"),
                Err(_) => {
                    warn!("Response listener did not drain in time, aborting");
                    listener.abort();
                }
            }
        }

        let rejected = self.pending.fail_all(&OffloadError::ShutDown);
        info!(rejected = rejected, "Hash offload service stopped");
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    /// Workers currently running, 0 when idle or stopped.
    pub fn worker_count(&self) -> usize {
        match &*self.lifecycle.lock() {
            Lifecycle::Running(running) => running.transport.worker_count(),
            _ => 0,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn stats(&self) -> &PendingStats {
        self.pending.stats()
    }

    pub fn config(&self) -> &OffloadConfig {
        &self.config
    }

    /// Ids issued so far by this correlator.
    pub fn requests_issued(&self) -> u64 {
        self.ids.issued()
    }

    fn ensure_running<'a>(&self, lifecycle: &'a mut Lifecycle) -> Result<&'a Running, OffloadError> {
        if matches!(lifecycle, Lifecycle::Idle) {
            *lifecycle = Lifecycle::Running(self.launch()?);
        }
        match lifecycle {
            Lifecycle::Running(running) => Ok(running),
            Lifecycle::Stopped => Err(OffloadError::ShutDown),
            Lifecycle::Idle => Err(OffloadError::Transport(
                "hash workers failed to start".to_string(),
            )),
        }
    }

    fn launch(&self) -> Result<Running, OffloadError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| OffloadError::NoRuntime)?;
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();

        let transport = self.backend.launch(responses_tx)?;
        let listener = runtime.spawn(
            ResponseListener::new(Arc::clone(&self.pending), responses_rx).run(),
        );

        info!(workers = transport.worker_count(), "Hash offload service started");
        Ok(Running {
            transport,
            listener,
        })
    }

    /// Synchronous half of `submit`: id, registration, dispatch.
    fn begin(&self, job: HashJob) -> Result<(RequestId, oneshot::Receiver<Settlement>), OffloadError> {
        let mut lifecycle = self.lifecycle.lock();
        let running = self.ensure_running(&mut lifecycle)?;

        let kind = job.kind();
        let request_id = self.ids.allocate();
        let frame = codec::encode_request(&job.into_request(request_id))?;
        let receiver = self.pending.register(request_id, kind)?;

        if let Err(e) = running.transport.dispatch(frame) {
            // Remove from pending if dispatch fails
            self.pending.cancel(request_id);
            return Err(e.into());
        }

        debug!(request_id = %request_id, kind = %kind, "Dispatched request to worker");
        Ok((request_id, receiver))
    }
}

impl HashOffloadApi for HashOffloadService {
    fn submit(
        &self,
        job: HashJob,
        deadline: Option<Duration>,
    ) -> BoxFuture<'static, Result<JobOutput, OffloadError>> {
        let deadline = deadline.or_else(|| self.config.default_timeout());
        match self.begin(job) {
            Ok((request_id, receiver)) => Box::pin(await_settlement(
                PendingGuard {
                    pending: Arc::clone(&self.pending),
                    request_id,
                },
                receiver,
                deadline,
            )),
            Err(e) => Box::pin(future::ready(Err(e))),
        }
    }
}

impl Drop for HashOffloadService {
    fn drop(&mut self) {
        if let Lifecycle::Running(running) =
            std::mem::replace(self.lifecycle.get_mut(), Lifecycle::Stopped)
        {
            // Dropping the transport closes the worker inboxes; threads
            // finish their current job and exit on their own.
            running.listener.abort();
            debug!("Hash offload service dropped while running");
        }

        // Callers still hold the table through their guards
        let rejected = self.pending.fail_all(&OffloadError::ShutDown);
        if rejected > 0 {
            debug!(rejected = rejected, "Rejected pending requests on drop");
        }
    }
}

/// Removes the pending entry if the caller stops waiting early.
///
/// Removal is idempotent, so the guard fires unconditionally on drop.
struct PendingGuard {
    pending: Arc<PendingRequestTable>,
    request_id: RequestId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.pending.cancel(self.request_id) {
            debug!(request_id = %self.request_id, "Caller stopped waiting, request cancelled");
        }
    }
}

async fn await_settlement(
    guard: PendingGuard,
    mut receiver: oneshot::Receiver<Settlement>,
    deadline: Option<Duration>,
) -> Result<JobOutput, OffloadError> {
    let request_id = guard.request_id;
    let received = match deadline {
        None => (&mut receiver).await,
        Some(after) => {
            let waited = tokio::time::timeout(after, &mut receiver).await;
            match waited {
                Ok(received) => received,
                Err(_) => {
                    if guard.pending.expire(request_id) {
                        warn!(
                            request_id = %request_id,
                            timeout_ms = after.as_millis() as u64,
                            "Request timed out, late response will be discarded"
                        );
                        return Err(OffloadError::Timeout { request_id, after });
                    }
                    // Settled in the same instant the deadline fired
                    match receiver.try_recv() {
                        Ok(settlement) => Ok(settlement),
                        Err(_) => return Err(OffloadError::Timeout { request_id, after }),
                    }
                }
            }
        }
    };

    // A dropped sender means the table went away with the service
    received.unwrap_or(Err(OffloadError::ShutDown))
}

/// Response listener that routes worker frames to pending requests.
pub struct ResponseListener {
    pending: Arc<PendingRequestTable>,
    responses: mpsc::UnboundedReceiver<String>,
}

impl ResponseListener {
    pub fn new(pending: Arc<PendingRequestTable>, responses: mpsc::UnboundedReceiver<String>) -> Self {
        Self { pending, responses }
    }

    /// Run the listener loop until every worker has dropped its sink.
    pub async fn run(mut self) {
        while let Some(frame) = self.responses.recv().await {
            self.handle_frame(&frame);
        }
        debug!("Response channel closed, stopping listener");
    }

    fn handle_frame(&self, frame: &str) {
        match codec::decode_response(frame) {
            Ok(response) => {
                self.pending.settle(response);
            }
            Err(e) => match codec::peek_request_id(frame) {
                Some(request_id) => {
                    warn!(request_id = %request_id, error = %e, "Undecodable worker response");
                    self.pending
                        .reject(request_id, OffloadError::Transport(e.to_string()));
                }
                None => warn!(error = %e, "Dropping worker response without request id"),
            },
        }
    }
}
