//! Upload orchestration for composite results.
//!
//! [`UploadCoordinator`] owns the [`UploadState`] of the current result and is its
//! only writer. Each result token gets at most one attempt in flight; failures can
//! be retried explicitly. The network call runs in a spawned task that is never
//! cancelled. Its outcome always lands in the coordinator, so the state never sticks
//! at `Uploading`; publication to subscribers is gated on a [`Liveness`]
//! capability so a view that went away is never written to.

use crate::{
    error::{PhotoBoothError, Result},
    types::{CompositeResult, ResultToken},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug as trace_debug, info as trace_info, instrument, warn as trace_warn};

/// Upload status of the current result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    Uploading,
    /// Remote URL of the stored image
    Succeeded(String),
    /// Human-readable failure message
    Failed(String),
}

impl UploadState {
    #[must_use]
    pub fn is_uploading(&self) -> bool {
        matches!(self, Self::Uploading)
    }

    /// Remote URL once the upload succeeded
    #[must_use]
    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Self::Succeeded(url) => Some(url),
            _ => None,
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Uploading => write!(f, "uploading"),
            Self::Succeeded(url) => write!(f, "uploaded to {}", url),
            Self::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// Stored image as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub secure_url: String,
    #[serde(default)]
    pub public_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Remote storage for composite results
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload the encoded result
    ///
    /// # Errors
    /// - `Upload` with a human-readable message on network or backend failure
    async fn upload(&self, result: &CompositeResult) -> Result<UploadedImage>;
}

/// Lifetime of the view that displays upload state.
///
/// Dropping it revokes every [`Liveness`] handed out.
#[derive(Debug, Default)]
pub struct ViewScope {
    alive: Arc<()>,
}

impl ViewScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn liveness(&self) -> Liveness {
        Liveness {
            scope: Some(Arc::downgrade(&self.alive)),
        }
    }
}

/// Capability checked before every state commit
#[derive(Debug, Clone)]
pub struct Liveness {
    scope: Option<Weak<()>>,
}

impl Liveness {
    /// Liveness not tied to any view; always alive
    #[must_use]
    pub fn detached() -> Self {
        Self { scope: None }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.scope
            .as_ref()
            .map_or(true, |scope| scope.strong_count() > 0)
    }
}

/// What happened to a ready notification
#[derive(Debug)]
pub enum ReadyOutcome {
    /// A new attempt was spawned
    Started(JoinHandle<()>),
    /// Same result is already uploading
    AlreadyUploading,
    /// Same result is already stored
    AlreadySucceeded,
    /// An older result than the current one; ignored
    Stale,
    /// The view is gone; nothing was started
    Detached,
}

impl ReadyOutcome {
    /// Handle of the spawned attempt, if one was started
    #[must_use]
    pub fn into_handle(self) -> Option<JoinHandle<()>> {
        match self {
            Self::Started(handle) => Some(handle),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Inner {
    state: UploadState,
    current: Option<CompositeResult>,
    latest: Option<ResultToken>,
    attempt: u64,
}

/// Drives uploads of composite results and publishes their state
pub struct UploadCoordinator {
    uploader: Arc<dyn Uploader>,
    inner: Arc<Mutex<Inner>>,
    state_tx: Arc<watch::Sender<UploadState>>,
}

impl UploadCoordinator {
    #[must_use]
    pub fn new(uploader: Arc<dyn Uploader>) -> Self {
        let (state_tx, _) = watch::channel(UploadState::Idle);
        Self {
            uploader,
            inner: Arc::new(Mutex::new(Inner::default())),
            state_tx: Arc::new(state_tx),
        }
    }

    /// Current state snapshot
    #[must_use]
    pub fn state(&self) -> UploadState {
        lock(&self.inner).state.clone()
    }

    /// Receive every published state transition.
    ///
    /// A new subscriber starts from the current state, including outcomes that
    /// arrived while no view was alive to see them.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        let state = lock(&self.inner).state.clone();
        self.state_tx.send_if_modified(|published| {
            if *published == state {
                false
            } else {
                *published = state;
                true
            }
        });
        self.state_tx.subscribe()
    }

    /// A composite is ready; upload it unless that already happened or is happening.
    ///
    /// Must be called inside a tokio runtime.
    pub fn on_result_ready(&self, result: CompositeResult, liveness: &Liveness) -> ReadyOutcome {
        if !liveness.is_alive() {
            trace_debug!(token = %result.token(), "Ready notification after view teardown");
            return ReadyOutcome::Detached;
        }

        let mut inner = lock(&self.inner);
        let token = result.token();
        if let Some(latest) = inner.latest {
            if token < latest {
                trace_debug!(token = %token, latest = %latest, "Ignoring stale result");
                return ReadyOutcome::Stale;
            }
            if token == latest {
                match inner.state {
                    UploadState::Uploading => return ReadyOutcome::AlreadyUploading,
                    UploadState::Succeeded(_) => return ReadyOutcome::AlreadySucceeded,
                    UploadState::Idle | UploadState::Failed(_) => {},
                }
            }
        }

        ReadyOutcome::Started(self.start_attempt(&mut inner, result, liveness.clone()))
    }

    /// Start a new attempt for the current result after a failure.
    ///
    /// # Errors
    /// - `InvalidState` unless the state is `Failed` and the view is alive
    pub fn retry(&self, liveness: &Liveness) -> Result<JoinHandle<()>> {
        if !liveness.is_alive() {
            return Err(PhotoBoothError::invalid_state(
                "retry requested after the view was closed",
            ));
        }

        let mut inner = lock(&self.inner);
        if !matches!(inner.state, UploadState::Failed(_)) {
            return Err(PhotoBoothError::invalid_state(format!(
                "retry is only possible after a failed upload (currently {})",
                inner.state
            )));
        }
        let result = inner
            .current
            .clone()
            .ok_or_else(|| PhotoBoothError::internal("failed upload without a result"))?;
        Ok(self.start_attempt(&mut inner, result, liveness.clone()))
    }

    /// Upload `result` and retry after failures, at most `retries` times.
    ///
    /// Returns the state once no attempt is left to make. A result that is already
    /// uploading, uploaded or stale is not uploaded again.
    ///
    /// # Errors
    /// - `InvalidState` when the view closes before a retry
    /// - `Internal` when an upload task panics
    pub async fn upload_with_retries(
        &self,
        result: CompositeResult,
        liveness: &Liveness,
        retries: u32,
    ) -> Result<UploadState> {
        if let Some(attempt) = self.on_result_ready(result, liveness).into_handle() {
            join(attempt).await?;
        }

        let mut remaining = retries;
        while remaining > 0 && matches!(self.state(), UploadState::Failed(_)) {
            remaining -= 1;
            trace_info!(remaining, "Retrying failed upload");
            join(self.retry(liveness)?).await?;
        }
        Ok(self.state())
    }

    fn start_attempt(
        &self,
        inner: &mut Inner,
        result: CompositeResult,
        liveness: Liveness,
    ) -> JoinHandle<()> {
        inner.attempt += 1;
        inner.latest = Some(result.token());
        inner.current = Some(result.clone());
        let attempt = inner.attempt;
        set_state(inner, &self.state_tx, UploadState::Uploading);

        trace_info!(token = %result.token(), attempt, "Starting upload");
        let uploader = Arc::clone(&self.uploader);
        let shared = Arc::clone(&self.inner);
        let state_tx = Arc::clone(&self.state_tx);
        tokio::spawn(async move {
            let outcome = run_attempt(uploader.as_ref(), &result).await;
            commit(&shared, &state_tx, attempt, &liveness, outcome);
        })
    }
}

async fn join(attempt: JoinHandle<()>) -> Result<()> {
    attempt
        .await
        .map_err(|e| PhotoBoothError::internal(format!("upload task failed: {}", e)))
}

#[instrument(skip_all, fields(token = %result.token(), bytes = result.bytes().len()))]
async fn run_attempt(uploader: &dyn Uploader, result: &CompositeResult) -> Result<UploadedImage> {
    uploader.upload(result).await
}

fn commit(
    shared: &Mutex<Inner>,
    state_tx: &watch::Sender<UploadState>,
    attempt: u64,
    liveness: &Liveness,
    outcome: Result<UploadedImage>,
) {
    let mut inner = lock(shared);
    if inner.attempt != attempt {
        trace_debug!(
            attempt,
            current = inner.attempt,
            "Superseded upload finished; outcome not committed"
        );
        return;
    }

    let next = match outcome {
        Ok(image) => {
            trace_info!(url = %image.secure_url, "Upload succeeded");
            UploadState::Succeeded(image.secure_url)
        },
        Err(e) => {
            trace_warn!(error = %e, "Upload failed");
            UploadState::Failed(e.user_message())
        },
    };

    if liveness.is_alive() {
        set_state(&mut inner, state_tx, next);
    } else {
        trace_debug!(attempt, state = %next, "View closed during upload; outcome not published");
        inner.state = next;
    }
}

fn set_state(inner: &mut Inner, state_tx: &watch::Sender<UploadState>, state: UploadState) {
    inner.state = state.clone();
    state_tx.send_replace(state);
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::OutputFormat,
        types::{Anchor, PlacementRect},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedUploader {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl ScriptedUploader {
        fn new(fail_first: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first,
            })
        }
    }

    #[async_trait]
    impl Uploader for ScriptedUploader {
        async fn upload(&self, result: &CompositeResult) -> Result<UploadedImage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(PhotoBoothError::upload("bad preset"));
            }
            Ok(UploadedImage {
                secure_url: format!("https://cdn.example.com/{}.png", result.token().0),
                public_id: "photo-booth/x".to_string(),
                width: 1,
                height: 1,
            })
        }
    }

    fn result() -> CompositeResult {
        CompositeResult::new(
            ResultToken::next(),
            vec![1, 2, 3],
            OutputFormat::Png,
            (1, 1),
            PlacementRect::new(0, 0, 1, 1),
            Anchor::CENTER,
        )
    }

    #[tokio::test]
    async fn test_success_path() {
        let uploader = ScriptedUploader::new(0);
        let coordinator = UploadCoordinator::new(uploader.clone());
        let scope = ViewScope::new();
        let result = result();

        let handle = coordinator
            .on_result_ready(result.clone(), &scope.liveness())
            .into_handle()
            .unwrap();
        handle.await.unwrap();

        let expected = format!("https://cdn.example.com/{}.png", result.token().0);
        assert_eq!(coordinator.state(), UploadState::Succeeded(expected));
        assert!(matches!(
            coordinator.on_result_ready(result, &scope.liveness()),
            ReadyOutcome::AlreadySucceeded
        ));
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let uploader = ScriptedUploader::new(1);
        let coordinator = UploadCoordinator::new(uploader.clone());
        let liveness = Liveness::detached();

        let handle = coordinator
            .on_result_ready(result(), &liveness)
            .into_handle()
            .unwrap();
        handle.await.unwrap();
        assert_eq!(coordinator.state(), UploadState::Failed("bad preset".to_string()));

        coordinator.retry(&liveness).unwrap().await.unwrap();
        assert!(coordinator.state().remote_url().is_some());
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_upload_with_retries_gives_up_after_budget() {
        let uploader = ScriptedUploader::new(2);
        let coordinator = UploadCoordinator::new(uploader.clone());
        let state = coordinator
            .upload_with_retries(result(), &Liveness::detached(), 1)
            .await
            .unwrap();
        assert_eq!(state, UploadState::Failed("bad preset".to_string()));
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 2);

        let uploader = ScriptedUploader::new(2);
        let coordinator = UploadCoordinator::new(uploader.clone());
        let state = coordinator
            .upload_with_retries(result(), &Liveness::detached(), 5)
            .await
            .unwrap();
        assert!(state.remote_url().is_some());
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_rejected_outside_failed() {
        let coordinator = UploadCoordinator::new(ScriptedUploader::new(0));
        let err = coordinator.retry(&Liveness::detached()).unwrap_err();
        assert!(matches!(err, PhotoBoothError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_stale_token_ignored() {
        let coordinator = UploadCoordinator::new(ScriptedUploader::new(0));
        let older = result();
        let newer = result();
        let liveness = Liveness::detached();

        let handle = coordinator.on_result_ready(newer, &liveness).into_handle().unwrap();
        assert!(matches!(
            coordinator.on_result_ready(older, &liveness),
            ReadyOutcome::Stale
        ));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_view_starts_nothing() {
        let uploader = ScriptedUploader::new(0);
        let coordinator = UploadCoordinator::new(uploader.clone());
        let scope = ViewScope::new();
        let liveness = scope.liveness();
        drop(scope);

        assert!(!liveness.is_alive());
        assert!(matches!(
            coordinator.on_result_ready(result(), &liveness),
            ReadyOutcome::Detached
        ));
        assert_eq!(coordinator.state(), UploadState::Idle);
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let coordinator = UploadCoordinator::new(ScriptedUploader::new(0));
        let mut rx = coordinator.subscribe();
        assert_eq!(*rx.borrow(), UploadState::Idle);

        let handle = coordinator
            .on_result_ready(result(), &Liveness::detached())
            .into_handle()
            .unwrap();
        handle.await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().remote_url().is_some());
    }

    #[test]
    fn test_uploaded_image_parses_backend_json() {
        let json = r#"{"secure_url":"https://res.example.com/a.png","public_id":"photo-booth/a","width":1000,"height":1200,"format":"png"}"#;
        let image: UploadedImage = serde_json::from_str(json).unwrap();
        assert_eq!(image.width, 1000);
        assert_eq!(image.public_id, "photo-booth/a");
    }
}
