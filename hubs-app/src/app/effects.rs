//! Asynchronous session helpers
//!
//! These run a request against the forum service and dispatch the actions
//! that describe its outcome. Session helpers never return an error: a
//! failed attempt settles the store into `Logout`. Each attempt takes a
//! session ticket, and an outcome that arrives after a newer attempt (or a
//! log out) started is dropped.

use std::sync::Arc;

use libhubs::api::session::ApiSession;
use libhubs::api::ForumApi;
use libhubs::types::{LogInData, SignUpData, User, UserToken};
use libhubs::ApiResult;

use super::actions::Action;
use super::store::{SessionTicket, Store};
use crate::error::Result;

/// How a failed attempt is reported
#[derive(Debug, Clone, Copy)]
enum FailureLog {
    Error,
    Debug,
}

fn settle(
    store: &Store,
    ticket: SessionTicket,
    result: ApiResult<UserToken>,
    what: &str,
    log: FailureLog,
) {
    let action = match result {
        Ok(user_token) => {
            tracing::info!("{} succeeded for {}", what, user_token.user.username);
            Action::login(user_token)
        }
        Err(e) => {
            match log {
                FailureLog::Error => tracing::error!("{} failed: {}", what, e),
                FailureLog::Debug => tracing::debug!("{} failed: {}", what, e),
            }
            Action::Logout
        }
    };

    store.dispatch_for(ticket, action);
}

/// Restore the session from the persisted token
///
/// Does nothing when no token is stored.
pub async fn authenticate(store: &Store, api: &dyn ForumApi) {
    let token = match store.stored_token() {
        Some(token) => token,
        None => {
            tracing::debug!("No stored session");
            return;
        }
    };

    let ticket = store.begin_session();
    store.dispatch_for(ticket, Action::LoggingIn);

    let result = api.auth(&token).await;
    settle(store, ticket, result, "Session restore", FailureLog::Error);
}

/// Sign in with username and password
pub async fn log_in(store: &Store, api: &dyn ForumApi, data: LogInData) {
    let ticket = store.begin_session();
    store.dispatch_for(ticket, Action::LoggingIn);

    let result = api.login(&data).await;
    // Wrong credentials are an expected outcome, not an incident
    settle(store, ticket, result, "Sign in", FailureLog::Debug);
}

/// Create an account and sign in to it
pub async fn create_account(store: &Store, api: &dyn ForumApi, data: SignUpData) {
    let ticket = store.begin_session();
    store.dispatch_for(ticket, Action::LoggingIn);

    let result = api.create_account(&data).await;
    settle(store, ticket, result, "Account creation", FailureLog::Error);
}

/// End the session and abandon any attempt in flight
pub fn log_out(store: &Store) {
    store.end_sessions();
    store.dispatch(Action::Logout);
}

/// Fetch fresh profile data for the signed-in user
///
/// Returns `Ok(None)` when nobody is signed in. The update is dropped if
/// the session changed while the request was in flight.
pub async fn refresh_user(store: &Store, api: &dyn ForumApi) -> Result<Option<User>> {
    let session = match store.state().user.clone() {
        Some(session) => session,
        None => return Ok(None),
    };

    let user = api
        .get_user(&session.user.username, Some(&session.token))
        .await?;

    let applied = store.dispatch_if(
        |state| state.token() == Some(session.token.as_str()),
        Action::UpdateUser { user: user.clone() },
    );
    if applied.is_none() {
        tracing::debug!("Session changed while refreshing {}", session.user.username);
    }

    Ok(Some(user))
}

/// API bound to the store's current session
pub fn api_session(store: &Store, api: Arc<dyn ForumApi>) -> ApiSession {
    ApiSession::new(api, store.state().user.clone())
}
