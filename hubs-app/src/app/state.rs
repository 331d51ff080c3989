//! Application state
//!
//! Immutable state structure. All state transitions happen through the
//! reducer (see `reducer.rs`); the store hands out `Arc<AppState>`
//! snapshots that never change under their readers.

use libhubs::config::DefaultsConfig;
use libhubs::storage::{keys, KeyValueStorage};
use libhubs::types::{SortMode, User, UserToken, ViewMode};

/// Root application state
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    /// Current session, if signed in
    pub user: Option<UserToken>,

    /// A session attempt is in flight
    pub is_loading_user: bool,

    /// Show explicit hubs and posts
    pub show_nsfw: bool,

    /// Favorite hub names, most recent last, no duplicates
    pub favorite_hubs: Vec<String>,

    pub view: ViewMode,

    pub sort: SortMode,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading_user: false,
            show_nsfw: false,
            favorite_hubs: Vec::new(),
            view: ViewMode::default(),
            sort: SortMode::default(),
        }
    }
}

impl AppState {
    /// Initial state: preferences from storage, falling back to `defaults`
    ///
    /// Favorites stay empty until a session is established.
    pub fn initial(storage: &dyn KeyValueStorage, defaults: &DefaultsConfig) -> Self {
        let show_nsfw = storage.get(keys::NSFW).as_deref() == Some("true");

        let view = stored_or(storage, keys::VIEW, defaults.view);
        let sort = stored_or(storage, keys::SORT, defaults.sort);

        Self {
            show_nsfw,
            view,
            sort,
            ..Self::default()
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Bearer token of the current session
    pub fn token(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.token.as_str())
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref().map(|u| &u.user)
    }

    pub fn is_favorite(&self, hub: &str) -> bool {
        self.favorite_hubs.iter().any(|name| name == hub)
    }
}

fn stored_or<T>(storage: &dyn KeyValueStorage, key: &str, fallback: T) -> T
where
    T: std::str::FromStr<Err = String>,
{
    match storage.get(key) {
        Some(value) => value.parse().unwrap_or_else(|e: String| {
            tracing::warn!("Ignoring stored {}: {}", key, e);
            fallback
        }),
        None => fallback,
    }
}

/// Decode the stored favorites list
///
/// Entries are space separated; blanks are dropped and a repeated name keeps
/// its most recent (last) position.
pub fn parse_favorites(value: &str) -> Vec<String> {
    let mut favorites: Vec<String> = Vec::new();
    for name in value.split(' ').map(str::trim).filter(|s| !s.is_empty()) {
        favorites.retain(|existing| existing != name);
        favorites.push(name.to_string());
    }
    favorites
}

pub fn format_favorites(favorites: &[String]) -> String {
    favorites.join(" ")
}
