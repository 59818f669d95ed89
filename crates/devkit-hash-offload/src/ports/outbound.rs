//! # Outbound Ports (Driven Ports)
//!
//! How the correlator reaches the isolated workers. Everything that
//! crosses this boundary is a serialized frame.

use crate::domain::errors::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Channel on which workers deliver serialized responses.
pub type ResponseSink = mpsc::UnboundedSender<String>;

/// A running set of workers accepting serialized requests.
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Queue one serialized request. Must not block the caller.
    fn dispatch(&self, frame: String) -> Result<(), TransportError>;

    /// Number of workers behind this transport.
    fn worker_count(&self) -> usize;

    /// Close the request queues and wait for in-flight work to finish.
    async fn close(self: Box<Self>);
}

/// Starts workers that answer on a response sink.
pub trait WorkerBackend: Send + Sync {
    fn launch(&self, responses: ResponseSink) -> Result<Box<dyn WorkerTransport>, TransportError>;
}
