//! Single-shot fetches and cancellation
//!
//! A `CancelHandle` is a shared signal. Work tied to it stops waiting as
//! soon as it fires, and late results are never applied. `Lifetime` fires
//! its handle when dropped, so tying fetches to the lifetime of whatever
//! displays them tears them down with it. `FetchCell` runs one fetch on a
//! tokio task and exposes its progress as a `FetchState`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Shared cancellation signal
#[derive(Clone)]
pub struct CancelHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    /// Cancel every holder of this handle; idempotent
    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow()
    }

    /// Resolves once the handle is cancelled
    pub async fn cancelled(&self) {
        let mut receiver = self.signal.subscribe();
        // The sender lives in `self`, so this only returns on cancellation
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels its handle on drop
#[derive(Debug, Default)]
pub struct Lifetime {
    handle: CancelHandle,
}

impl Lifetime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to give to loaders and fetch cells owned by this lifetime
    pub fn handle(&self) -> CancelHandle {
        self.handle.clone()
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

/// Progress of a single fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T, E> {
    Loading,
    Ready(T),
    Failed(E),
}

impl<T, E> FetchState<T, E> {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FetchState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            FetchState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// One fetch running in the background
///
/// Clones share the same state and task. Cancelling drops the fetch
/// future, releasing whatever it holds, and leaves the state `Loading`.
pub struct FetchCell<T, E> {
    state: Arc<watch::Sender<FetchState<T, E>>>,
    cancel: CancelHandle,
    task: Arc<AbortHandle>,
}

impl<T, E> Clone for FetchCell<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            cancel: self.cancel.clone(),
            task: self.task.clone(),
        }
    }
}

impl<T, E> FetchCell<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Start `future` on the current tokio runtime
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::spawn_with(CancelHandle::new(), future)
    }

    /// Start `future`, abandoning it if `cancel` fires first
    pub fn spawn_with<F>(cancel: CancelHandle, future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (sender, _) = watch::channel(FetchState::Loading);
        let state = Arc::new(sender);

        let task_state = state.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = task_cancel.cancelled() => {
                    tracing::debug!("Fetch cancelled before completing");
                    return;
                }
                result = future => result,
            };

            task_state.send_replace(match result {
                Ok(value) => FetchState::Ready(value),
                Err(error) => FetchState::Failed(error),
            });
        });

        Self {
            state,
            cancel,
            task: Arc::new(task.abort_handle()),
        }
    }

    /// Current state
    pub fn state(&self) -> FetchState<T, E> {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Replace the result, e.g. after editing the fetched value locally
    pub fn set_result(&self, value: T) {
        self.state.send_replace(FetchState::Ready(value));
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        self.task.abort();
    }

    /// The fetch task has stopped, by completing or by being cancelled
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the fetch completes or the cell is cancelled
    ///
    /// A cell cancelled before completing stays `Loading`.
    pub async fn settled(&self) -> FetchState<T, E> {
        let mut receiver = self.state.subscribe();
        let settled = tokio::select! {
            result = receiver.wait_for(|state| !state.is_loading()) => match result {
                Ok(state) => state.clone(),
                Err(_) => self.state(),
            },
            _ = self.cancel.cancelled() => self.state(),
        };
        settled
    }
}
