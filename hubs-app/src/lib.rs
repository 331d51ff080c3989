//! hubs-app library
//!
//! Application layer of the Hubs client: the store that owns session and
//! preference state, the helpers that establish sessions, and the loaders
//! that page through lists and feeds.

pub mod app;
pub mod client;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod list;
pub mod visibility;

// Re-export commonly used types
pub use app::{reduce, Action, AppState, Store, StoreEvent};
pub use client::Client;
pub use error::{AppError, Result};
pub use feed::{FeedSource, PostFeed};
pub use fetch::{CancelHandle, FetchCell, FetchState, Lifetime};
pub use list::{ListLoader, ListState, ListStatus};
pub use visibility::{LoadMoreTrigger, VisibilitySentinel};
