//! Reducer for state transitions
//!
//! `reduce` computes the next state from the current state and an action.
//! It never performs network I/O. Its one side effect is keeping the durable
//! preference keys (`token`, `nsfw`, `view`, `sort`, `history`) in step with
//! the state it returns; a failed storage write is logged and the transition
//! still happens.

use libhubs::storage::{keys, KeyValueStorage};

use super::actions::Action;
use super::state::{format_favorites, parse_favorites, AppState};

/// Apply `action` to `state`
///
/// Total over all actions: `Action::Unknown` returns the state unchanged.
pub fn reduce(state: AppState, action: &Action, storage: &dyn KeyValueStorage) -> AppState {
    match action {
        // === Session ===
        Action::LoggingIn => AppState {
            is_loading_user: true,
            ..state
        },

        Action::Login { user_token } => {
            persist(storage, keys::TOKEN, &user_token.token);

            let favorite_hubs = storage
                .get(keys::FAVORITES)
                .map(|value| parse_favorites(&value))
                .unwrap_or_default();

            AppState {
                user: Some(user_token.clone()),
                is_loading_user: false,
                favorite_hubs,
                ..state
            }
        }

        Action::Logout => {
            if let Err(e) = storage.remove(keys::TOKEN) {
                tracing::warn!("Failed to erase session token: {}", e);
            }

            AppState {
                user: None,
                is_loading_user: false,
                ..state
            }
        }

        Action::UpdateUser { user } => match state.user.clone() {
            Some(mut session) => {
                session.user = user.clone();
                AppState {
                    user: Some(session),
                    ..state
                }
            }
            None => state,
        },

        // === Preferences ===
        Action::FavoriteHub { name } => {
            let mut favorite_hubs: Vec<String> = state
                .favorite_hubs
                .iter()
                .filter(|existing| *existing != name)
                .cloned()
                .collect();
            favorite_hubs.push(name.clone());

            persist(storage, keys::FAVORITES, &format_favorites(&favorite_hubs));

            AppState {
                favorite_hubs,
                ..state
            }
        }

        Action::UnfavoriteHub { name } => {
            if !state.is_favorite(name) {
                return state;
            }

            let favorite_hubs: Vec<String> = state
                .favorite_hubs
                .iter()
                .filter(|existing| *existing != name)
                .cloned()
                .collect();

            persist(storage, keys::FAVORITES, &format_favorites(&favorite_hubs));

            AppState {
                favorite_hubs,
                ..state
            }
        }

        Action::ToggleNsfw => {
            let show_nsfw = !state.show_nsfw;
            persist(storage, keys::NSFW, if show_nsfw { "true" } else { "false" });

            AppState { show_nsfw, ..state }
        }

        Action::SetView { view } => {
            persist(storage, keys::VIEW, view.as_str());
            AppState {
                view: *view,
                ..state
            }
        }

        Action::SetSort { sort } => {
            persist(storage, keys::SORT, sort.as_str());
            AppState {
                sort: *sort,
                ..state
            }
        }

        Action::Unknown => state,
    }
}

fn persist(storage: &dyn KeyValueStorage, key: &str, value: &str) {
    if let Err(e) = storage.set(key, value) {
        tracing::warn!("Failed to persist {}: {}", key, e);
    }
}
