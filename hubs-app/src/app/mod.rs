//! Application module
//!
//! Contains the core application architecture:
//! - Actions: What can happen
//! - State: What is true right now
//! - Reducer: (State, Action) -> State, keeping durable preferences in step
//! - Store: Owns the state, dispatches actions, notifies subscribers
//! - Effects: Async session helpers that dispatch their outcome

pub mod actions;
pub mod effects;
pub mod reducer;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use actions::Action;
pub use reducer::reduce;
pub use state::AppState;
pub use store::{SessionTicket, Store, StoreEvent, StoreReceiver};
