//! REST collaborator for the forum service
//!
//! `ForumApi` is the seam between the client and the remote service. The
//! HTTP implementation talks to a real deployment; the mock implementation
//! keeps everything in memory so the application layer can be exercised
//! without a network.
//!
//! # Examples
//!
//! ```no_run
//! use libhubs::api::{ForumApi, http::HttpApi};
//! use libhubs::query::PostQuery;
//! use libhubs::types::SortMode;
//!
//! # async fn example() -> Result<(), libhubs::error::ApiError> {
//! let api = HttpApi::new("https://hubs.example.org/", 30)?;
//!
//! let posts = api
//!     .get_posts(
//!         &PostQuery {
//!             sort: Some(SortMode::Hot),
//!             limit: Some(20),
//!             ..Default::default()
//!         },
//!         None,
//!     )
//!     .await?;
//! println!("{} posts", posts.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::ApiError;
use crate::query::{HubQuery, ModeratorQuery, PostQuery, UserQuery};
use crate::types::{
    CommentCreateData, HubBase, HubPatch, HubQueryResult, Hub, LogInData, Moderator,
    ModeratorCreateData, Permissions, Post, PostQueryResult, ReactionChoice, SignUpData,
    Subscription, User, UserPatch, UserToken, TopicCreateData,
};

pub mod http;
pub mod session;

// Mock API is available for all builds (not just tests) to support integration tests
pub mod mock;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Operations exposed by the forum service
///
/// Read operations take an optional token: anonymous callers can read, and a
/// token adds per-user data such as the caller's reaction on each post.
/// Write operations require a token.
#[async_trait]
pub trait ForumApi: Send + Sync {
    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    /// Exchange a stored token for the session it belongs to
    async fn auth(&self, token: &str) -> ApiResult<UserToken>;

    /// Sign in with username and password
    async fn login(&self, data: &LogInData) -> ApiResult<UserToken>;

    /// Create an account and sign in to it
    async fn create_account(&self, data: &SignUpData) -> ApiResult<UserToken>;

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    async fn get_user(&self, username: &str, token: Option<&str>) -> ApiResult<User>;

    async fn get_users(&self, query: &UserQuery, token: Option<&str>) -> ApiResult<Vec<User>>;

    async fn patch_user(&self, token: &str, username: &str, patch: &UserPatch) -> ApiResult<User>;

    // ------------------------------------------------------------------
    // Hubs
    // ------------------------------------------------------------------

    async fn create_hub(&self, token: &str, data: &HubBase) -> ApiResult<Hub>;

    async fn get_hub(&self, name: &str, token: Option<&str>) -> ApiResult<HubQueryResult>;

    async fn get_hubs(&self, query: &HubQuery, token: Option<&str>) -> ApiResult<Vec<Hub>>;

    async fn patch_hub(&self, token: &str, name: &str, patch: &HubPatch) -> ApiResult<Hub>;

    async fn delete_hub(&self, token: &str, name: &str) -> ApiResult<()>;

    async fn subscribe(&self, token: &str, hub: &str) -> ApiResult<Subscription>;

    async fn unsubscribe(&self, token: &str, hub: &str) -> ApiResult<()>;

    // ------------------------------------------------------------------
    // Moderators
    // ------------------------------------------------------------------

    async fn get_moderators(&self, query: &ModeratorQuery) -> ApiResult<Vec<Moderator>>;

    async fn create_moderator(
        &self,
        token: &str,
        data: &ModeratorCreateData,
    ) -> ApiResult<Moderator>;

    async fn patch_moderator(
        &self,
        token: &str,
        id: &str,
        permissions: &Permissions,
    ) -> ApiResult<Moderator>;

    async fn delete_moderator(&self, token: &str, id: &str) -> ApiResult<()>;

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    async fn create_topic(&self, token: &str, hub: &str, data: &TopicCreateData) -> ApiResult<Post>;

    async fn create_comment(
        &self,
        token: &str,
        parent_id: &str,
        data: &CommentCreateData,
    ) -> ApiResult<Post>;

    async fn get_post(&self, id: &str, token: Option<&str>) -> ApiResult<PostQueryResult>;

    async fn get_posts(
        &self,
        query: &PostQuery,
        token: Option<&str>,
    ) -> ApiResult<Vec<PostQueryResult>>;

    async fn delete_post(&self, token: &str, id: &str) -> ApiResult<()>;

    /// Like, dislike, or clear the caller's reaction; returns the updated post
    async fn react(&self, token: &str, id: &str, reaction: ReactionChoice) -> ApiResult<Post>;

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    /// Upload an image and return the URL it can be read from
    ///
    /// Two phases: request a signed write location for `content_type`,
    /// then upload the bytes directly to it.
    async fn upload_image(&self, token: &str, bytes: Vec<u8>, content_type: &str)
        -> ApiResult<String>;
}
