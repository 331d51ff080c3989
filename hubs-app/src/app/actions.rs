//! Actions for the reducer pattern
//!
//! All state transitions are triggered by actions. Actions serialize as
//! `{"type": "SET_SORT", "sort": "top"}` so they can be logged or replayed
//! across a process boundary; an unrecognized `type` decodes to
//! `Action::Unknown`, which the reducer ignores.

use libhubs::types::{SortMode, User, UserToken, ViewMode};
use serde::{Deserialize, Serialize};

/// Actions that trigger state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    // === Session ===
    /// A session attempt is in flight
    LoggingIn,

    /// A session was established
    Login {
        #[serde(rename = "userToken")]
        user_token: UserToken,
    },

    /// The session ended or could not be established
    Logout,

    /// Fresh profile data for the signed-in user
    UpdateUser { user: User },

    // === Preferences ===
    /// Mark a hub as favorite, making it the most recent one
    FavoriteHub { name: String },

    UnfavoriteHub { name: String },

    ToggleNsfw,

    SetView { view: ViewMode },

    SetSort { sort: SortMode },

    /// Any action this client does not know about
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Action name as it appears in the serialized form
    pub fn name(&self) -> &'static str {
        match self {
            Action::LoggingIn => "LOGGING_IN",
            Action::Login { .. } => "LOGIN",
            Action::Logout => "LOGOUT",
            Action::UpdateUser { .. } => "UPDATE_USER",
            Action::FavoriteHub { .. } => "FAVORITE_HUB",
            Action::UnfavoriteHub { .. } => "UNFAVORITE_HUB",
            Action::ToggleNsfw => "TOGGLE_NSFW",
            Action::SetView { .. } => "SET_VIEW",
            Action::SetSort { .. } => "SET_SORT",
            Action::Unknown => "UNKNOWN",
        }
    }

    pub fn login(user_token: UserToken) -> Self {
        Action::Login { user_token }
    }

    pub fn favorite_hub(name: impl Into<String>) -> Self {
        Action::FavoriteHub { name: name.into() }
    }

    pub fn unfavorite_hub(name: impl Into<String>) -> Self {
        Action::UnfavoriteHub { name: name.into() }
    }
}
