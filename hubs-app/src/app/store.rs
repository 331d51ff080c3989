//! Application store
//!
//! Single owner of `AppState`. Every change goes through `dispatch`, which
//! reduces and publishes under one lock so subscribers observe events in
//! dispatch order.
//!
//! Persisted preferences are written to storage inside `dispatch`, while
//! the lock is held. With `FileStorage` that is a blocking file write per
//! changed key. Dispatching from an async task stalls its worker for that
//! long; tasks that cannot afford it should share the store through an
//! `Arc` and dispatch from `tokio::task::spawn_blocking`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hubs_app::app::{Action, Store};
//! use libhubs::config::DefaultsConfig;
//! use libhubs::storage::MemoryStorage;
//!
//! # async fn example() {
//! let store = Store::new(Arc::new(MemoryStorage::new()), &DefaultsConfig::default());
//! let mut events = store.subscribe();
//!
//! store.dispatch(Action::favorite_hub("rust"));
//!
//! if let Ok(event) = events.recv().await {
//!     assert_eq!(event.state.favorite_hubs, vec!["rust"]);
//! }
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use libhubs::config::DefaultsConfig;
use libhubs::storage::{keys, KeyValueStorage};
use tokio::sync::broadcast;

use super::actions::Action;
use super::reducer::reduce;
use super::state::AppState;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Receiver of store events
pub type StoreReceiver = broadcast::Receiver<StoreEvent>;

/// Published after every dispatch
#[derive(Debug, Clone)]
pub struct StoreEvent {
    /// The action that was applied
    pub action: Action,
    /// State after the action
    pub state: Arc<AppState>,
}

struct Inner {
    state: Arc<AppState>,
    /// Advanced by every session attempt and by log out
    generation: u64,
}

/// Ticket for one session attempt; see `Store::begin_session`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket(u64);

pub struct Store {
    inner: Mutex<Inner>,
    storage: Arc<dyn KeyValueStorage>,
    sender: broadcast::Sender<StoreEvent>,
}

impl Store {
    /// Create a store whose initial preferences come from `storage`
    pub fn new(storage: Arc<dyn KeyValueStorage>, defaults: &DefaultsConfig) -> Self {
        let state = AppState::initial(storage.as_ref(), defaults);
        Self::with_state(storage, state)
    }

    pub fn with_state(storage: Arc<dyn KeyValueStorage>, state: AppState) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                state: Arc::new(state),
                generation: 0,
            }),
            storage,
            sender,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current snapshot
    pub fn state(&self) -> Arc<AppState> {
        self.lock().state.clone()
    }

    /// Receive an event for every dispatch made after this call
    ///
    /// A subscriber that falls more than the channel capacity behind gets
    /// `RecvError::Lagged` and continues from the oldest retained event.
    pub fn subscribe(&self) -> StoreReceiver {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }

    /// Session token persisted by a previous login
    pub fn stored_token(&self) -> Option<String> {
        self.storage.get(keys::TOKEN).filter(|token| !token.is_empty())
    }

    /// Apply `action` and notify subscribers; returns the new snapshot
    ///
    /// Blocks on storage writes; see the module docs.
    pub fn dispatch(&self, action: Action) -> Arc<AppState> {
        let mut inner = self.lock();
        Self::apply(&mut inner, &self.sender, self.storage.as_ref(), action)
    }

    fn apply(
        inner: &mut Inner,
        sender: &broadcast::Sender<StoreEvent>,
        storage: &dyn KeyValueStorage,
        action: Action,
    ) -> Arc<AppState> {
        tracing::debug!("Dispatching {}", action.name());

        let next = reduce((*inner.state).clone(), &action, storage);
        if next != *inner.state {
            inner.state = Arc::new(next);
        }

        let state = inner.state.clone();
        // No receivers is fine
        let _ = sender.send(StoreEvent {
            action,
            state: state.clone(),
        });
        state
    }

    /// Dispatch `action` only if `guard` holds for the current state
    ///
    /// `guard` runs under the same lock as the dispatch.
    pub fn dispatch_if<P>(&self, guard: P, action: Action) -> Option<Arc<AppState>>
    where
        P: FnOnce(&AppState) -> bool,
    {
        let mut inner = self.lock();
        if !guard(&inner.state) {
            tracing::debug!("Dropping {}: state changed", action.name());
            return None;
        }
        Some(Self::apply(
            &mut inner,
            &self.sender,
            self.storage.as_ref(),
            action,
        ))
    }

    /// Start a session attempt, superseding any attempt still in flight
    pub fn begin_session(&self) -> SessionTicket {
        let mut inner = self.lock();
        inner.generation += 1;
        SessionTicket(inner.generation)
    }

    /// Invalidate every outstanding session attempt
    pub fn end_sessions(&self) {
        self.lock().generation += 1;
    }

    pub fn is_current(&self, ticket: SessionTicket) -> bool {
        self.lock().generation == ticket.0
    }

    /// Dispatch `action` only if `ticket` is still the newest attempt
    ///
    /// The check and the dispatch happen under the same lock, so a newer
    /// attempt or a log out cannot slip in between.
    pub fn dispatch_for(&self, ticket: SessionTicket, action: Action) -> Option<Arc<AppState>> {
        let mut inner = self.lock();
        if inner.generation != ticket.0 {
            tracing::debug!(
                "Dropping stale {} (attempt {}, current {})",
                action.name(),
                ticket.0,
                inner.generation
            );
            return None;
        }
        Some(Self::apply(
            &mut inner,
            &self.sender,
            self.storage.as_ref(),
            action,
        ))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libhubs::storage::MemoryStorage;
    use libhubs::types::SortMode;

    fn store() -> Store {
        Store::new(Arc::new(MemoryStorage::new()), &DefaultsConfig::default())
    }

    #[tokio::test]
    async fn test_events_arrive_in_dispatch_order() {
        let store = store();
        let mut receiver = store.subscribe();

        store.dispatch(Action::favorite_hub("a"));
        store.dispatch(Action::favorite_hub("b"));
        store.dispatch(Action::SetSort { sort: SortMode::New });

        let first = receiver.recv().await.unwrap();
        let second = receiver.recv().await.unwrap();
        let third = receiver.recv().await.unwrap();

        assert_eq!(first.action, Action::favorite_hub("a"));
        assert_eq!(second.state.favorite_hubs, vec!["a", "b"]);
        assert_eq!(third.state.sort, SortMode::New);
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let store = store();
        let before = store.state();

        store.dispatch(Action::ToggleNsfw);

        assert!(!before.show_nsfw);
        assert!(store.state().show_nsfw);
    }

    #[test]
    fn test_unchanged_state_keeps_snapshot() {
        let store = store();
        let before = store.state();
        let after = store.dispatch(Action::Unknown);
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_dispatch_without_subscribers() {
        let store = store();
        assert_eq!(store.subscriber_count(), 0);
        store.dispatch(Action::LoggingIn);
        assert!(store.state().is_loading_user);
    }

    #[test]
    fn test_stale_ticket_is_dropped() {
        let store = store();
        let old = store.begin_session();
        let new = store.begin_session();

        assert!(!store.is_current(old));
        assert!(store.dispatch_for(old, Action::LoggingIn).is_none());
        assert!(!store.state().is_loading_user);

        assert!(store.dispatch_for(new, Action::LoggingIn).is_some());
        store.end_sessions();
        assert!(!store.is_current(new));
    }

    #[test]
    fn test_dispatch_if_checks_current_state() {
        let store = store();
        let mut receiver = store.subscribe();

        assert!(store
            .dispatch_if(|state| state.show_nsfw, Action::LoggingIn)
            .is_none());
        assert!(!store.state().is_loading_user);
        assert!(receiver.try_recv().is_err());

        assert!(store
            .dispatch_if(|state| !state.show_nsfw, Action::LoggingIn)
            .is_some());
        assert!(store.state().is_loading_user);
    }

    #[tokio::test]
    async fn test_dispatch_from_blocking_pool() {
        let store = Arc::new(store());
        let handle = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || store.dispatch(Action::ToggleNsfw))
        };
        assert!(handle.await.unwrap().show_nsfw);
        assert_eq!(store.storage().get(keys::NSFW), Some("true".to_string()));
    }

    #[test]
    fn test_stored_token_ignores_empty() {
        let storage = Arc::new(MemoryStorage::with_values([(keys::TOKEN, "")]));
        let store = Store::new(storage, &DefaultsConfig::default());
        assert_eq!(store.stored_token(), None);
    }
}
