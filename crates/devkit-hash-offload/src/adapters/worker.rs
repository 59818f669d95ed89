//! # Worker Runtime
//!
//! Isolated execution context for bcrypt work. A worker owns nothing but a
//! request inbox and a response sink, shares no memory with callers, and
//! answers every frame it receives with exactly one frame, in arrival order.
//!
//! Once the stop signal is raised, frames still queued are skipped without
//! an answer; the correlator rejects their callers with `ShutDown`.

use crate::adapters::codec;
use crate::domain::errors::TransportError;
use crate::domain::hashing;
use crate::domain::messages::{HashRequest, HashResponse};
use crate::ports::outbound::ResponseSink;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Stateless hash/verify server for one worker thread.
#[derive(Debug, Clone)]
pub struct WorkerRuntime {
    name: String,
    stopping: Arc<AtomicBool>,
}

impl WorkerRuntime {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a stop signal, e.g. across the workers of one pool.
    pub fn with_stop_signal(mut self, stopping: Arc<AtomicBool>) -> Self {
        self.stopping = stopping;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one request to completion. Blocks for the full bcrypt cost.
    pub fn process(&self, request: HashRequest) -> HashResponse {
        let request_id = request.request_id();
        let kind = request.kind();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match request {
            HashRequest::Hash {
                request_id,
                password,
                rounds,
                salt,
                variant,
            } => match hashing::hash_password(&password, rounds, salt.as_deref(), variant) {
                Ok(output) => {
                    debug!(
                        worker = %self.name,
                        request_id = %request_id,
                        rounds = rounds,
                        elapsed_ms = output.compute_time_ms,
                        "Hash computed"
                    );
                    HashResponse::HashResult {
                        request_id,
                        result: output.hash,
                        compute_time_ms: output.compute_time_ms,
                    }
                }
                Err(e) => {
                    warn!(worker = %self.name, request_id = %request_id, error = %e, "Hash request failed");
                    HashResponse::failure(request_id, e.to_string())
                }
            },
            HashRequest::Verify {
                request_id,
                password,
                hash,
            } => HashResponse::VerifyResult {
                request_id,
                result: hashing::verify_password(&password, &hash),
            },
        }));

        outcome.unwrap_or_else(|_| {
            error!(worker = %self.name, request_id = %request_id, kind = %kind, "Hash primitive panicked");
            HashResponse::failure(request_id, format!("{} computation aborted", kind))
        })
    }

    /// Decode, process and encode one frame.
    ///
    /// Returns `None` only for frames that carry no recoverable request id,
    /// since there is nobody to answer.
    pub fn handle_frame(&self, frame: &str) -> Option<String> {
        let response = match codec::decode_request(frame) {
            Ok(request) => self.process(request),
            Err(e) => match codec::peek_request_id(frame) {
                Some(request_id) => {
                    warn!(worker = %self.name, request_id = %request_id, error = %e, "Rejecting undecodable request");
                    HashResponse::failure(request_id, e.to_string())
                }
                None => {
                    warn!(worker = %self.name, error = %e, "Dropping frame without a request id");
                    return None;
                }
            },
        };

        match codec::encode_response(&response) {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!(worker = %self.name, request_id = %response.request_id(), error = %e, "Failed to encode response");
                codec::encode_response(&HashResponse::failure(
                    response.request_id(),
                    format!("failed to encode response: {}", e),
                ))
                .ok()
            }
        }
    }

    /// Receive loop. Exits when the inbox closes or nobody listens anymore.
    pub fn run(self, mut inbox: mpsc::UnboundedReceiver<String>, outbox: ResponseSink) {
        debug!(worker = %self.name, "Worker started");
        let mut skipped = 0usize;
        while let Some(frame) = inbox.blocking_recv() {
            if self.stopping.load(Ordering::Acquire) {
                skipped += 1;
                continue;
            }
            let Some(reply) = self.handle_frame(&frame) else {
                continue;
            };
            if outbox.send(reply).is_err() {
                debug!(worker = %self.name, "Response channel closed, stopping worker");
                break;
            }
        }
        debug!(worker = %self.name, skipped = skipped, "Worker stopped");
    }

    /// Start the receive loop on a dedicated, named OS thread.
    pub fn spawn(
        self,
        inbox: mpsc::UnboundedReceiver<String>,
        outbox: ResponseSink,
    ) -> Result<JoinHandle<()>, TransportError> {
        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || self.run(inbox, outbox))
            .map_err(|e| TransportError::Spawn(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hashing::is_bcrypt_hash;
    use crate::domain::messages::HashJob;
    use crate::domain::request_id::RequestId;

    fn worker() -> WorkerRuntime {
        WorkerRuntime::new("test-worker")
    }

    fn id(raw: u64) -> RequestId {
        RequestId::from_raw(raw)
    }

    #[test]
    fn test_process_hash() {
        let response = worker().process(HashJob::hash("test123", 4).into_request(id(1)));
        match response {
            HashResponse::HashResult {
                request_id, result, ..
            } => {
                assert_eq!(request_id, id(1));
                assert!(is_bcrypt_hash(&result));
            }
            other => panic!("expected hash result, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_cost_becomes_failure() {
        for rounds in [0, 32] {
            let response = worker().process(HashJob::hash("pw", rounds).into_request(id(2)));
            match response {
                HashResponse::Failure { request_id, error } => {
                    assert_eq!(request_id, id(2));
                    assert!(error.contains("Invalid cost"), "error: {}", error);
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_malformed_candidate_is_false_not_failure() {
        let response = worker().process(HashJob::verify("pw", "$1$garbage").into_request(id(3)));
        assert_eq!(
            response,
            HashResponse::VerifyResult {
                request_id: id(3),
                result: false
            }
        );
    }

    #[test]
    fn test_undecodable_frame_with_id_answered() {
        let reply = worker()
            .handle_frame(r#"{"kind":"hash","requestId":8,"password":"pw","rounds":-3}"#)
            .unwrap();
        let response = codec::decode_response(&reply).unwrap();
        assert_eq!(response.request_id(), id(8));
        assert!(matches!(response, HashResponse::Failure { .. }));
    }

    #[test]
    fn test_frame_without_id_dropped() {
        assert!(worker().handle_frame("{}").is_none());
        assert!(worker().handle_frame("garbage").is_none());
    }

    #[test]
    fn test_run_answers_in_order() {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let handle = worker().spawn(in_rx, out_tx).unwrap();

        for raw in 1..=3 {
            let request = HashJob::verify("pw", "bad").into_request(id(raw));
            in_tx.send(codec::encode_request(&request).unwrap()).unwrap();
        }
        drop(in_tx);
        handle.join().unwrap();

        let mut seen = Vec::new();
        while let Ok(frame) = out_rx.try_recv() {
            seen.push(codec::decode_response(&frame).unwrap().request_id().get());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_queued_frames_skipped_after_stop() {
        let stopping = Arc::new(AtomicBool::new(true));
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        for raw in 1..=3 {
            let request = HashJob::hash("pw", 4).into_request(id(raw));
            in_tx.send(codec::encode_request(&request).unwrap()).unwrap();
        }
        drop(in_tx);
        worker()
            .with_stop_signal(stopping)
            .spawn(in_rx, out_tx)
            .unwrap()
            .join()
            .unwrap();

        assert!(out_rx.try_recv().is_err());
    }
}
