//! Token-scoped view of the forum API
//!
//! `ApiSession` pairs a `ForumApi` with the current session, if any. Reads
//! forward the token when one is present; writes fail fast with
//! `ApiError::Unauthenticated` when there is none instead of reaching the
//! service.

use std::sync::Arc;

use crate::api::{ApiResult, ForumApi};
use crate::error::ApiError;
use crate::query::{HubQuery, ModeratorQuery, PostQuery, UserQuery};
use crate::types::{
    CommentCreateData, Hub, HubBase, HubPatch, HubQueryResult, Moderator, ModeratorCreateData,
    Permissions, Post, PostQueryResult, ReactionChoice, Subscription, TopicCreateData, User,
    UserPatch, UserToken,
};

#[derive(Clone)]
pub struct ApiSession {
    api: Arc<dyn ForumApi>,
    session: Option<UserToken>,
}

impl ApiSession {
    pub fn new(api: Arc<dyn ForumApi>, session: Option<UserToken>) -> Self {
        Self { api, session }
    }

    pub fn anonymous(api: Arc<dyn ForumApi>) -> Self {
        Self::new(api, None)
    }

    pub fn api(&self) -> &Arc<dyn ForumApi> {
        &self.api
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    fn require_token(&self) -> ApiResult<&str> {
        self.token().ok_or(ApiError::Unauthenticated)
    }

    // Reads

    pub async fn get_user(&self, username: &str) -> ApiResult<User> {
        self.api.get_user(username, self.token()).await
    }

    pub async fn get_users(&self, query: &UserQuery) -> ApiResult<Vec<User>> {
        self.api.get_users(query, self.token()).await
    }

    pub async fn get_hub(&self, name: &str) -> ApiResult<HubQueryResult> {
        self.api.get_hub(name, self.token()).await
    }

    pub async fn get_hubs(&self, query: &HubQuery) -> ApiResult<Vec<Hub>> {
        self.api.get_hubs(query, self.token()).await
    }

    pub async fn get_moderators(&self, query: &ModeratorQuery) -> ApiResult<Vec<Moderator>> {
        self.api.get_moderators(query).await
    }

    pub async fn get_post(&self, id: &str) -> ApiResult<PostQueryResult> {
        self.api.get_post(id, self.token()).await
    }

    pub async fn get_posts(&self, query: &PostQuery) -> ApiResult<Vec<PostQueryResult>> {
        self.api.get_posts(query, self.token()).await
    }

    // Writes

    pub async fn patch_user(&self, username: &str, patch: &UserPatch) -> ApiResult<User> {
        let token = self.require_token()?;
        self.api.patch_user(token, username, patch).await
    }

    pub async fn create_hub(&self, data: &HubBase) -> ApiResult<Hub> {
        let token = self.require_token()?;
        self.api.create_hub(token, data).await
    }

    pub async fn patch_hub(&self, name: &str, patch: &HubPatch) -> ApiResult<Hub> {
        let token = self.require_token()?;
        self.api.patch_hub(token, name, patch).await
    }

    pub async fn delete_hub(&self, name: &str) -> ApiResult<()> {
        let token = self.require_token()?;
        self.api.delete_hub(token, name).await
    }

    pub async fn subscribe(&self, hub: &str) -> ApiResult<Subscription> {
        let token = self.require_token()?;
        self.api.subscribe(token, hub).await
    }

    pub async fn unsubscribe(&self, hub: &str) -> ApiResult<()> {
        let token = self.require_token()?;
        self.api.unsubscribe(token, hub).await
    }

    pub async fn create_moderator(&self, data: &ModeratorCreateData) -> ApiResult<Moderator> {
        let token = self.require_token()?;
        self.api.create_moderator(token, data).await
    }

    pub async fn patch_moderator(&self, id: &str, permissions: &Permissions) -> ApiResult<Moderator> {
        let token = self.require_token()?;
        self.api.patch_moderator(token, id, permissions).await
    }

    pub async fn delete_moderator(&self, id: &str) -> ApiResult<()> {
        let token = self.require_token()?;
        self.api.delete_moderator(token, id).await
    }

    pub async fn create_topic(&self, hub: &str, data: &TopicCreateData) -> ApiResult<Post> {
        let token = self.require_token()?;
        self.api.create_topic(token, hub, data).await
    }

    pub async fn create_comment(&self, parent_id: &str, data: &CommentCreateData) -> ApiResult<Post> {
        let token = self.require_token()?;
        self.api.create_comment(token, parent_id, data).await
    }

    pub async fn delete_post(&self, id: &str) -> ApiResult<()> {
        let token = self.require_token()?;
        self.api.delete_post(token, id).await
    }

    pub async fn react(&self, id: &str, reaction: ReactionChoice) -> ApiResult<Post> {
        let token = self.require_token()?;
        self.api.react(token, id, reaction).await
    }

    pub async fn upload_image(&self, bytes: Vec<u8>, content_type: &str) -> ApiResult<String> {
        let token = self.require_token()?;
        self.api.upload_image(token, bytes, content_type).await
    }
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSession")
            .field("user", &self.user().map(|u| u.username.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::types::MARKDOWN_CONTENT_TYPE;

    #[tokio::test]
    async fn test_anonymous_writes_fail_without_calling_service() {
        let mock = Arc::new(MockApi::success());
        let session = ApiSession::anonymous(mock.clone());

        let result = session.subscribe("rust").await;
        assert_eq!(result, Err(ApiError::Unauthenticated));

        let upload = session.upload_image(vec![0], "image/png").await;
        assert_eq!(upload, Err(ApiError::Unauthenticated));
        assert!(mock.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_reads_succeed() {
        let mock = Arc::new(MockApi::success());
        mock.add_user("ana", "pw").unwrap();
        mock.add_hub("rust", "ana", false).unwrap();

        let session = ApiSession::anonymous(mock);
        let hub = session.get_hub("rust").await.unwrap();
        assert!(!hub.subscribed);
        assert!(!session.is_signed_in());
    }

    #[tokio::test]
    async fn test_signed_in_session_forwards_token() {
        let mock = Arc::new(MockApi::success());
        let ana = mock.add_user("ana", "pw").unwrap();
        mock.add_hub("rust", "ana", false).unwrap();

        let session = ApiSession::new(mock, Some(ana));
        session.subscribe("rust").await.unwrap();
        let topic = session
            .create_topic(
                "rust",
                &TopicCreateData {
                    title: "Hello".to_string(),
                    tags: "intro".to_string(),
                    content: "first post".to_string(),
                    content_type: MARKDOWN_CONTENT_TYPE,
                    is_nsfw: false,
                },
            )
            .await
            .unwrap();

        let hub = session.get_hub("rust").await.unwrap();
        assert!(hub.subscribed);
        assert!(hub.permissions.can_edit);
        assert_eq!(session.get_post(topic.id()).await.unwrap().post, topic);
        assert_eq!(session.user().map(|u| u.username.as_str()), Some("ana"));
    }
}
