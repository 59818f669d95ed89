//! # Hash Facade
//!
//! Reactive wrapper over [`HashOffloadApi`] for views that recompute on
//! every input change. Each side (hash, verify) publishes its state on a
//! `watch` channel.
//!
//! Every input bumps that side's generation. A settlement is published only
//! if its generation is still the latest, so rapid input lets every
//! submission complete but shows only the newest result.

use crate::domain::messages::HashOutput;
use crate::domain::password::Password;
use crate::ports::inbound::HashOffloadApi;
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStatus {
    #[default]
    Idle,
    Computing,
    Ready,
    Failed,
}

/// What a hash view should display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashViewState {
    pub generation: u64,
    pub status: ViewStatus,
    pub hash: Option<String>,
    pub compute_time_ms: Option<u64>,
    pub error: Option<String>,
}

impl HashViewState {
    fn idle(generation: u64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    fn computing(generation: u64) -> Self {
        Self {
            generation,
            status: ViewStatus::Computing,
            ..Default::default()
        }
    }

    fn ready(generation: u64, output: HashOutput) -> Self {
        Self {
            generation,
            status: ViewStatus::Ready,
            hash: Some(output.hash),
            compute_time_ms: Some(output.compute_time_ms),
            error: None,
        }
    }

    fn failed(generation: u64, error: String) -> Self {
        Self {
            generation,
            status: ViewStatus::Failed,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// What a verify view should display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyViewState {
    pub generation: u64,
    pub status: ViewStatus,
    pub matches: Option<bool>,
    pub error: Option<String>,
}

impl VerifyViewState {
    fn idle(generation: u64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    fn computing(generation: u64) -> Self {
        Self {
            generation,
            status: ViewStatus::Computing,
            ..Default::default()
        }
    }

    fn ready(generation: u64, matches: bool) -> Self {
        Self {
            generation,
            status: ViewStatus::Ready,
            matches: Some(matches),
            error: None,
        }
    }

    fn failed(generation: u64, error: String) -> Self {
        Self {
            generation,
            status: ViewStatus::Failed,
            error: Some(error),
            ..Default::default()
        }
    }
}

trait Generational {
    fn generation(&self) -> u64;
}

impl Generational for HashViewState {
    fn generation(&self) -> u64 {
        self.generation
    }
}

impl Generational for VerifyViewState {
    fn generation(&self) -> u64 {
        self.generation
    }
}

/// Hash and verify state holder for a view layer.
pub struct HashFacade {
    api: Arc<dyn HashOffloadApi>,
    hash_view: Arc<watch::Sender<HashViewState>>,
    verify_view: Arc<watch::Sender<VerifyViewState>>,
}

impl HashFacade {
    pub fn new(api: Arc<dyn HashOffloadApi>) -> Self {
        let (hash_view, _) = watch::channel(HashViewState::default());
        let (verify_view, _) = watch::channel(VerifyViewState::default());
        Self {
            api,
            hash_view: Arc::new(hash_view),
            verify_view: Arc::new(verify_view),
        }
    }

    pub fn subscribe_hash(&self) -> watch::Receiver<HashViewState> {
        self.hash_view.subscribe()
    }

    pub fn subscribe_verify(&self) -> watch::Receiver<VerifyViewState> {
        self.verify_view.subscribe()
    }

    pub fn hash_state(&self) -> HashViewState {
        self.hash_view.borrow().clone()
    }

    pub fn verify_state(&self) -> VerifyViewState {
        self.verify_view.borrow().clone()
    }

    /// React to new hash input.
    ///
    /// An empty password resets the view to idle without submitting.
    /// Otherwise returns the task that publishes the settlement.
    pub fn input_hash(&self, password: impl Into<Password>, rounds: u32) -> Option<JoinHandle<()>> {
        let password = password.into();
        if password.is_empty() {
            advance(&self.hash_view, HashViewState::idle);
            return None;
        }

        let generation = advance(&self.hash_view, HashViewState::computing);
        let Ok(runtime) = Handle::try_current() else {
            publish_latest(
                &self.hash_view,
                HashViewState::failed(generation, "no async runtime available".to_string()),
            );
            return None;
        };

        let reply = self.api.hash(password, rounds);
        let view = Arc::clone(&self.hash_view);
        Some(runtime.spawn(async move {
            let next = match reply.await {
                Ok(output) => HashViewState::ready(generation, output),
                Err(e) => HashViewState::failed(generation, e.to_string()),
            };
            if !publish_latest(&view, next) {
                debug!(generation = generation, "Discarding superseded hash result");
            }
        }))
    }

    /// React to new verify input. Empty password or hash resets to idle.
    pub fn input_verify(
        &self,
        password: impl Into<Password>,
        hash: impl Into<String>,
    ) -> Option<JoinHandle<()>> {
        let password = password.into();
        let hash = hash.into();
        if password.is_empty() || hash.is_empty() {
            advance(&self.verify_view, VerifyViewState::idle);
            return None;
        }

        let generation = advance(&self.verify_view, VerifyViewState::computing);
        let Ok(runtime) = Handle::try_current() else {
            publish_latest(
                &self.verify_view,
                VerifyViewState::failed(generation, "no async runtime available".to_string()),
            );
            return None;
        };

        let reply = self.api.verify(password, hash);
        let view = Arc::clone(&self.verify_view);
        Some(runtime.spawn(async move {
            let next = match reply.await {
                Ok(matches) => VerifyViewState::ready(generation, matches),
                Err(e) => VerifyViewState::failed(generation, e.to_string()),
            };
            if !publish_latest(&view, next) {
                debug!(generation = generation, "Discarding superseded verify result");
            }
        }))
    }

    /// Reset both views to idle. In-flight results are discarded.
    pub fn reset(&self) {
        advance(&self.hash_view, HashViewState::idle);
        advance(&self.verify_view, VerifyViewState::idle);
    }
}

/// Move the view to the next generation and return it.
fn advance<T: Generational>(view: &watch::Sender<T>, make: impl FnOnce(u64) -> T) -> u64 {
    let mut generation = 0;
    view.send_modify(|state| {
        generation = state.generation() + 1;
        *state = make(generation);
    });
    generation
}

/// Publish `next` only if no newer input arrived meanwhile.
fn publish_latest<T: Generational>(view: &watch::Sender<T>, next: T) -> bool {
    view.send_if_modified(|state| {
        if state.generation() != next.generation() {
            return false;
        }
        *state = next;
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::OffloadConfig;
    use crate::domain::errors::OffloadError;
    use crate::domain::messages::{HashJob, JobOutput};
    use crate::service::HashOffloadService;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Reply = oneshot::Sender<Result<JobOutput, OffloadError>>;

    /// Answers only when the test says so.
    #[derive(Default)]
    struct ScriptedApi {
        replies: Mutex<Vec<Reply>>,
    }

    impl ScriptedApi {
        fn take(&self) -> Vec<Reply> {
            std::mem::take(&mut *self.replies.lock())
        }
    }

    impl HashOffloadApi for ScriptedApi {
        fn submit(
            &self,
            _job: HashJob,
            _deadline: Option<Duration>,
        ) -> BoxFuture<'static, Result<JobOutput, OffloadError>> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().push(tx);
            Box::pin(async move { rx.await.unwrap_or(Err(OffloadError::ShutDown)) })
        }
    }

    fn hashed(hash: &str) -> Result<JobOutput, OffloadError> {
        Ok(JobOutput::Hashed(HashOutput {
            hash: hash.to_string(),
            compute_time_ms: 1,
        }))
    }

    #[tokio::test]
    async fn test_latest_submission_wins() {
        let api = Arc::new(ScriptedApi::default());
        let facade = HashFacade::new(api.clone());

        let first = facade.input_hash("a", 4).unwrap();
        let second = facade.input_hash("ab", 4).unwrap();
        let state = facade.hash_state();
        assert_eq!(state.status, ViewStatus::Computing);
        assert_eq!(state.generation, 2);

        let mut replies = api.take();
        let newer = replies.pop().unwrap();
        let older = replies.pop().unwrap();

        newer.send(hashed("new")).unwrap();
        second.await.unwrap();
        older.send(hashed("old")).unwrap();
        first.await.unwrap();

        let state = facade.hash_state();
        assert_eq!(state.status, ViewStatus::Ready);
        assert_eq!(state.generation, 2);
        assert_eq!(state.hash.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_empty_input_resets_to_idle() {
        let api = Arc::new(ScriptedApi::default());
        let facade = HashFacade::new(api.clone());

        let pending = facade.input_hash("secret", 4).unwrap();
        assert!(facade.input_hash("", 4).is_none());
        assert_eq!(facade.hash_state().status, ViewStatus::Idle);

        // The cleared submission still completes but is not shown
        for reply in api.take() {
            reply.send(hashed("late")).unwrap();
        }
        pending.await.unwrap();
        assert_eq!(facade.hash_state(), HashViewState::idle(2));
    }

    #[tokio::test]
    async fn test_failure_published() {
        let api = Arc::new(ScriptedApi::default());
        let facade = HashFacade::new(api.clone());
        let mut updates = facade.subscribe_verify();

        let task = facade.input_verify("pw", "$2b$04$x").unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow_and_update().status, ViewStatus::Computing);

        for reply in api.take() {
            reply.send(Err(OffloadError::ShutDown)).unwrap();
        }
        task.await.unwrap();

        let state = facade.verify_state();
        assert_eq!(state.status, ViewStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("hash offload service is shut down"));
    }

    #[test]
    fn test_input_without_runtime_fails_view() {
        let facade = HashFacade::new(Arc::new(ScriptedApi::default()));
        assert!(facade.input_verify("pw", "hash").is_none());
        assert_eq!(facade.verify_state().status, ViewStatus::Failed);
    }

    #[tokio::test]
    async fn test_round_trip_through_service() {
        let service = Arc::new(HashOffloadService::new(OffloadConfig::default()).unwrap());
        let facade = HashFacade::new(service.clone());

        facade.input_hash("test123", 4).unwrap().await.unwrap();
        let hashed = facade.hash_state();
        assert_eq!(hashed.status, ViewStatus::Ready);
        let hash = hashed.hash.unwrap();

        facade.input_verify("test123", hash.clone()).unwrap().await.unwrap();
        assert_eq!(facade.verify_state().matches, Some(true));

        facade.input_verify("wrong", hash).unwrap().await.unwrap();
        assert_eq!(facade.verify_state().matches, Some(false));

        facade.reset();
        assert_eq!(facade.hash_state().status, ViewStatus::Idle);
        service.shutdown().await;
    }
}
