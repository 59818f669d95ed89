//! Thread-backed worker pool.
//!
//! One OS thread per worker, each with its own FIFO inbox. Requests are
//! spread round-robin, so completion order across workers can differ from
//! submission order; correlation by request id covers that.
//!
//! Closing or dropping the pool raises a shared stop signal: jobs already
//! running finish, queued ones are skipped.

use crate::adapters::worker::WorkerRuntime;
use crate::domain::config::OffloadConfig;
use crate::domain::errors::TransportError;
use crate::ports::outbound::{ResponseSink, WorkerBackend, WorkerTransport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Launches a [`WorkerPool`] of OS threads.
#[derive(Debug, Clone)]
pub struct ThreadPoolBackend {
    workers: usize,
    thread_name_prefix: String,
}

impl ThreadPoolBackend {
    pub fn new(workers: usize, thread_name_prefix: impl Into<String>) -> Self {
        Self {
            workers,
            thread_name_prefix: thread_name_prefix.into(),
        }
    }

    pub fn from_config(config: &OffloadConfig) -> Self {
        Self::new(config.workers, config.thread_name_prefix.clone())
    }
}

impl WorkerBackend for ThreadPoolBackend {
    fn launch(&self, responses: ResponseSink) -> Result<Box<dyn WorkerTransport>, TransportError> {
        let pool = WorkerPool::spawn(self.workers, &self.thread_name_prefix, responses)?;
        Ok(Box::new(pool))
    }
}

/// Running worker threads and their inboxes.
pub struct WorkerPool {
    inboxes: Vec<mpsc::UnboundedSender<String>>,
    threads: Vec<JoinHandle<()>>,
    next: AtomicUsize,
    stopping: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `workers` threads named `<prefix>-<n>`.
    pub fn spawn(
        workers: usize,
        prefix: &str,
        responses: ResponseSink,
    ) -> Result<Self, TransportError> {
        if workers == 0 {
            return Err(TransportError::NoWorkers);
        }

        let stopping = Arc::new(AtomicBool::new(false));
        let mut inboxes = Vec::with_capacity(workers);
        let mut threads = Vec::with_capacity(workers);
        for n in 0..workers {
            let (tx, rx) = mpsc::unbounded_channel();
            // On failure the inboxes already created are dropped, which
            // stops the threads spawned so far.
            let handle = WorkerRuntime::new(format!("{}-{}", prefix, n))
                .with_stop_signal(Arc::clone(&stopping))
                .spawn(rx, responses.clone())?;
            inboxes.push(tx);
            threads.push(handle);
        }

        info!(workers = workers, prefix = prefix, "Hash worker pool started");
        Ok(Self {
            inboxes,
            threads,
            next: AtomicUsize::new(0),
            stopping,
        })
    }

    /// Raise the stop signal and close every inbox.
    fn stop(&mut self) {
        self.stopping.store(true, Ordering::Release);
        self.inboxes.clear();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Threads are detached, not joined
        self.stop();
    }
}

#[async_trait]
impl WorkerTransport for WorkerPool {
    fn dispatch(&self, frame: String) -> Result<(), TransportError> {
        if self.inboxes.is_empty() {
            return Err(TransportError::NoWorkers);
        }
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.inboxes.len();
        self.inboxes[slot]
            .send(frame)
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn worker_count(&self) -> usize {
        self.inboxes.len()
    }

    async fn close(self: Box<Self>) {
        let mut pool = self;
        pool.stop();
        let threads = std::mem::take(&mut pool.threads);
        drop(pool);

        let joined = tokio::task::spawn_blocking(move || {
            threads
                .into_iter()
                .filter_map(|handle| handle.join().err())
                .count()
        })
        .await;

        match joined {
            Ok(0) => info!("Hash worker pool stopped"),
            Ok(panicked) => warn!(panicked = panicked, "Hash worker pool stopped with panicked threads"),
            Err(e) => warn!(error = %e, "Failed to join hash worker threads"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::codec;
    use crate::domain::messages::HashJob;
    use crate::domain::request_id::RequestId;

    #[test]
    fn test_zero_workers_refused() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            WorkerPool::spawn(0, "w", tx),
            Err(TransportError::NoWorkers)
        ));
    }

    #[tokio::test]
    async fn test_round_robin_dispatch_answers_all() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let backend = ThreadPoolBackend::new(3, "pool-test");
        let pool = backend.launch(tx).unwrap();
        assert_eq!(pool.worker_count(), 3);

        for raw in 1..=6 {
            let request = HashJob::verify("pw", "bad").into_request(RequestId::from_raw(raw));
            pool.dispatch(codec::encode_request(&request).unwrap()).unwrap();
        }

        let mut ids = Vec::new();
        for _ in 0..6 {
            let frame = rx.recv().await.unwrap();
            ids.push(codec::decode_response(&frame).unwrap().request_id().get());
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);

        pool.close().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_skips_queued_jobs() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = ThreadPoolBackend::new(1, "pool-stop").launch(tx).unwrap();

        for raw in 1..=4 {
            let request = HashJob::hash("pw", 12).into_request(RequestId::from_raw(raw));
            pool.dispatch(codec::encode_request(&request).unwrap()).unwrap();
        }
        pool.close().await;

        // At most the job already running gets an answer
        let mut answered = 0;
        while rx.recv().await.is_some() {
            answered += 1;
        }
        assert!(answered <= 1, "answered {} queued jobs", answered);
    }
}
