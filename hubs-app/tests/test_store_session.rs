//! Session lifecycle through the store
//!
//! Drives the async session helpers against the in-memory forum service
//! and checks the state and storage they leave behind.

use std::sync::Arc;

use hubs_app::app::effects::{authenticate, create_account, log_in, log_out};
use hubs_app::app::{Action, AppState, Store, StoreEvent};
use libhubs::api::mock::MockApi;
use libhubs::config::DefaultsConfig;
use libhubs::storage::{keys, FileStorage, KeyValueStorage, MemoryStorage};
use libhubs::types::{LogInData, SignUpData};
use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;

fn setup(storage: MemoryStorage) -> (Store, Arc<MemoryStorage>) {
    let storage = Arc::new(storage);
    let store = Store::new(storage.clone(), &DefaultsConfig::default());
    (store, storage)
}

fn drain(receiver: &mut tokio::sync::broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
    events
}

fn credentials(username: &str, password: &str) -> LogInData {
    LogInData {
        username: username.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_bootstrap_without_token_does_nothing() {
    let (store, _) = setup(MemoryStorage::new());
    let mut events = store.subscribe();
    let api = MockApi::success();

    authenticate(&store, &api).await;

    assert!(drain(&mut events).is_empty());
    assert_eq!(*store.state(), AppState::default());
}

#[tokio::test]
async fn test_bootstrap_with_token_restores_session_and_favorites() {
    let api = MockApi::success();
    let ana = api.add_user("ana", "pw").unwrap();
    let (store, _) = setup(MemoryStorage::with_values([
        (keys::TOKEN, ana.token.as_str()),
        (keys::FAVORITES, "rust gamedev"),
    ]));
    let mut events = store.subscribe();

    authenticate(&store, &api).await;

    let state = store.state();
    assert_eq!(state.token(), Some(ana.token.as_str()));
    assert!(!state.is_loading_user);
    assert_eq!(state.favorite_hubs, vec!["rust", "gamedev"]);

    let names: Vec<_> = drain(&mut events).iter().map(|e| e.action.name()).collect();
    assert_eq!(names, vec!["LOGGING_IN", "LOGIN"]);
}

#[tokio::test]
async fn test_loading_flag_only_between_logging_in_and_outcome() {
    let api = MockApi::success();
    api.add_user("ana", "pw").unwrap();
    let (store, _) = setup(MemoryStorage::new());
    let mut events = store.subscribe();

    log_in(&store, &api, credentials("ana", "pw")).await;
    log_in(&store, &api, credentials("ana", "wrong")).await;

    let events = drain(&mut events);
    let flags: Vec<_> = events
        .iter()
        .map(|e| (e.action.name(), e.state.is_loading_user))
        .collect();
    assert_eq!(
        flags,
        vec![
            ("LOGGING_IN", true),
            ("LOGIN", false),
            ("LOGGING_IN", true),
            ("LOGOUT", false),
        ]
    );
}

#[tokio::test]
async fn test_bad_credentials_leave_store_logged_out() {
    let api = MockApi::success();
    api.add_user("ana", "pw").unwrap();
    let (store, storage) = setup(MemoryStorage::new());

    log_in(&store, &api, credentials("ana", "nope")).await;

    let state = store.state();
    assert!(!state.is_logged_in());
    assert!(!state.is_loading_user);
    assert_eq!(storage.get(keys::TOKEN), None);
}

#[tokio::test]
async fn test_create_account_signs_in() {
    let api = MockApi::success();
    let (store, storage) = setup(MemoryStorage::new());

    create_account(
        &store,
        &api,
        SignUpData {
            username: "bo".to_string(),
            password: "secret".to_string(),
            name: "Bo".to_string(),
            email: "bo@example.org".to_string(),
        },
    )
    .await;

    let state = store.state();
    assert_eq!(state.current_user().map(|u| u.name.as_str()), Some("Bo"));
    assert_eq!(storage.get(keys::TOKEN), state.token().map(str::to_string));
}

#[tokio::test]
async fn test_create_account_failure_logs_out() {
    let api = MockApi::success();
    api.add_user("bo", "taken").unwrap();
    let (store, _) = setup(MemoryStorage::new());

    create_account(
        &store,
        &api,
        SignUpData {
            username: "bo".to_string(),
            password: "secret".to_string(),
            name: "Bo".to_string(),
            email: "bo@example.org".to_string(),
        },
    )
    .await;

    assert!(!store.state().is_logged_in());
    assert!(!store.state().is_loading_user);
}

#[tokio::test]
async fn test_logout_always_clears_session() {
    let api = MockApi::success();
    api.add_user("ana", "pw").unwrap();
    let (store, storage) = setup(MemoryStorage::new());

    log_in(&store, &api, credentials("ana", "pw")).await;
    store.dispatch(Action::LoggingIn);
    log_out(&store);

    let state = store.state();
    assert_eq!(state.user, None);
    assert!(!state.is_loading_user);
    assert_eq!(storage.get(keys::TOKEN), None);

    // Logging out twice is harmless
    log_out(&store);
    assert_eq!(store.state().user, None);
}

#[tokio::test]
async fn test_newer_attempt_wins_over_slower_older_one() {
    let api = Arc::new(MockApi::with_delay(std::time::Duration::from_millis(30)));
    api.add_user("ana", "pw").unwrap();
    let bo = api.add_user("bo", "pw").unwrap();
    let store = Arc::new(Store::new(
        Arc::new(MemoryStorage::new()),
        &DefaultsConfig::default(),
    ));

    // Both attempts are in flight at once; only the later one may settle
    futures::future::join(
        log_in(&store, api.as_ref(), credentials("ana", "pw")),
        log_in(&store, api.as_ref(), credentials("bo", "pw")),
    )
    .await;

    let state = store.state();
    assert_eq!(state.token(), Some(bo.token.as_str()));
    assert!(!state.is_loading_user);
}

#[tokio::test]
async fn test_preferences_survive_restart_with_file_storage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    {
        let store = Store::new(
            Arc::new(FileStorage::open(&path).unwrap()),
            &DefaultsConfig::default(),
        );
        store.dispatch(Action::ToggleNsfw);
        store.dispatch(Action::SetSort {
            sort: libhubs::types::SortMode::Top,
        });
        store.dispatch(Action::favorite_hub("rust"));
    }

    let store = Store::new(
        Arc::new(FileStorage::open(&path).unwrap()),
        &DefaultsConfig::default(),
    );
    let state = store.state();
    assert!(state.show_nsfw);
    assert_eq!(state.sort, libhubs::types::SortMode::Top);
    // Favorites come back with the next session, not at startup
    assert!(state.favorite_hubs.is_empty());
    assert_eq!(
        store.storage().get(keys::FAVORITES),
        Some("rust".to_string())
    );
}
