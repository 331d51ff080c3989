//! Hubs - a client for a hub-based discussion forum
//!
//! This library provides the domain types the forum service exchanges, a
//! REST client for it, the query encoding its list endpoints expect, and
//! durable key-value storage for client preferences.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use api::{http::HttpApi, session::ApiSession, ApiResult, ForumApi};
pub use config::Config;
pub use error::{ApiError, HubsError, Result};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use types::{Cursor, Hub, Post, PostQueryResult, SortMode, User, UserToken, ViewMode};
