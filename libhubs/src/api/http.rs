//! HTTP implementation of the forum API
//!
//! Every non-success response and every transport failure collapses into an
//! `ApiError` at this boundary; callers never see `reqwest` types.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::api::{ApiResult, ForumApi};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::query::{HubQuery, ModeratorQuery, PostQuery, QueryParams, ToQuery, UserQuery};
use crate::types::{
    CommentCreateData, Hub, HubBase, HubPatch, HubQueryResult, ImageUploadTarget, LogInData,
    Moderator, ModeratorCreateData, Permissions, Post, PostQueryResult, ReactionChoice,
    SignUpData, Subscription, TopicCreateData, User, UserPatch, UserToken,
};

fn map_transport_error(error: reqwest::Error, context: &str) -> ApiError {
    if error.is_decode() {
        ApiError::Decode(format!("{}: {}", context, error))
    } else {
        ApiError::Network(format!("{}: {}", context, error))
    }
}

/// Forum API over HTTP
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    endpoint: Url,
}

impl HttpApi {
    /// Create a client for the service at `endpoint`
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidEndpoint` if the endpoint is not an absolute
    /// URL that can carry a path, or `ApiError::Network` if the HTTP client
    /// cannot be built.
    pub fn new(endpoint: &str, timeout_secs: u64) -> ApiResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ApiError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(ApiError::InvalidEndpoint(endpoint.to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| map_transport_error(e, "build HTTP client"))?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &ApiConfig) -> ApiResult<Self> {
        Self::new(&config.endpoint, config.timeout_secs)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build `<endpoint>/<segments...>` with each segment percent-encoded
    pub fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidEndpoint(self.endpoint.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    pub fn url_with_query(&self, segments: &[&str], params: &QueryParams) -> ApiResult<Url> {
        let mut url = self.url(segments)?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params.pairs() {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, token: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> ApiResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("{} failed with HTTP {}", context, status);
            return Err(ApiError::from_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown status"),
            ));
        }

        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder, context: &str) -> ApiResult<T> {
        self.send(builder, context)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{}: {}", context, e)))
    }
}

#[async_trait]
impl ForumApi for HttpApi {
    async fn auth(&self, token: &str) -> ApiResult<UserToken> {
        let url = self.url(&["api", "auth", "jwt"])?;
        self.json(self.request(Method::POST, url, Some(token)), "auth")
            .await
    }

    async fn login(&self, data: &LogInData) -> ApiResult<UserToken> {
        let url = self.url(&["api", "auth", "jwt", "signin"])?;
        self.json(self.request(Method::POST, url, None).json(data), "login")
            .await
    }

    async fn create_account(&self, data: &SignUpData) -> ApiResult<UserToken> {
        let url = self.url(&["api", "auth", "jwt", "create"])?;
        self.json(
            self.request(Method::POST, url, None).json(data),
            "create account",
        )
        .await
    }

    async fn get_user(&self, username: &str, token: Option<&str>) -> ApiResult<User> {
        let url = self.url(&["api", "user", username])?;
        self.json(self.request(Method::GET, url, token), "get user")
            .await
    }

    async fn get_users(&self, query: &UserQuery, token: Option<&str>) -> ApiResult<Vec<User>> {
        let url = self.url_with_query(&["api", "user"], &query.to_query())?;
        self.json(self.request(Method::GET, url, token), "get users")
            .await
    }

    async fn patch_user(&self, token: &str, username: &str, patch: &UserPatch) -> ApiResult<User> {
        let url = self.url(&["api", "user", username])?;
        self.json(
            self.request(Method::PATCH, url, Some(token)).json(patch),
            "patch user",
        )
        .await
    }

    async fn create_hub(&self, token: &str, data: &HubBase) -> ApiResult<Hub> {
        let url = self.url(&["api", "hub"])?;
        self.json(
            self.request(Method::POST, url, Some(token)).json(data),
            "create hub",
        )
        .await
    }

    async fn get_hub(&self, name: &str, token: Option<&str>) -> ApiResult<HubQueryResult> {
        let url = self.url(&["api", "hub", name])?;
        self.json(self.request(Method::GET, url, token), "get hub")
            .await
    }

    async fn get_hubs(&self, query: &HubQuery, token: Option<&str>) -> ApiResult<Vec<Hub>> {
        let url = self.url_with_query(&["api", "hub"], &query.to_query())?;
        self.json(self.request(Method::GET, url, token), "get hubs")
            .await
    }

    async fn patch_hub(&self, token: &str, name: &str, patch: &HubPatch) -> ApiResult<Hub> {
        let url = self.url(&["api", "hub", name])?;
        self.json(
            self.request(Method::PATCH, url, Some(token)).json(patch),
            "patch hub",
        )
        .await
    }

    async fn delete_hub(&self, token: &str, name: &str) -> ApiResult<()> {
        let url = self.url(&["api", "hub", name])?;
        self.send(self.request(Method::DELETE, url, Some(token)), "delete hub")
            .await?;
        Ok(())
    }

    async fn subscribe(&self, token: &str, hub: &str) -> ApiResult<Subscription> {
        let url = self.url(&["api", "hub", hub, "subscribe"])?;
        self.json(self.request(Method::POST, url, Some(token)), "subscribe")
            .await
    }

    async fn unsubscribe(&self, token: &str, hub: &str) -> ApiResult<()> {
        let url = self.url(&["api", "hub", hub, "unsubscribe"])?;
        self.send(self.request(Method::DELETE, url, Some(token)), "unsubscribe")
            .await?;
        Ok(())
    }

    async fn get_moderators(&self, query: &ModeratorQuery) -> ApiResult<Vec<Moderator>> {
        let url = self.url_with_query(&["api", "moderator"], &query.to_query())?;
        self.json(self.request(Method::GET, url, None), "get moderators")
            .await
    }

    async fn create_moderator(
        &self,
        token: &str,
        data: &ModeratorCreateData,
    ) -> ApiResult<Moderator> {
        let url = self.url(&["api", "moderator"])?;
        self.json(
            self.request(Method::POST, url, Some(token)).json(data),
            "create moderator",
        )
        .await
    }

    async fn patch_moderator(
        &self,
        token: &str,
        id: &str,
        permissions: &Permissions,
    ) -> ApiResult<Moderator> {
        let url = self.url(&["api", "moderator", id])?;
        self.json(
            self.request(Method::PATCH, url, Some(token)).json(permissions),
            "patch moderator",
        )
        .await
    }

    async fn delete_moderator(&self, token: &str, id: &str) -> ApiResult<()> {
        let url = self.url(&["api", "moderator", id])?;
        self.send(
            self.request(Method::DELETE, url, Some(token)),
            "delete moderator",
        )
        .await?;
        Ok(())
    }

    async fn create_topic(&self, token: &str, hub: &str, data: &TopicCreateData) -> ApiResult<Post> {
        let url = self.url(&["api", "hub", hub, "topics"])?;
        self.json(
            self.request(Method::POST, url, Some(token)).json(data),
            "create topic",
        )
        .await
    }

    async fn create_comment(
        &self,
        token: &str,
        parent_id: &str,
        data: &CommentCreateData,
    ) -> ApiResult<Post> {
        let url = self.url(&["api", "post", parent_id, "comments"])?;
        self.json(
            self.request(Method::POST, url, Some(token)).json(data),
            "create comment",
        )
        .await
    }

    async fn get_post(&self, id: &str, token: Option<&str>) -> ApiResult<PostQueryResult> {
        let url = self.url(&["api", "post", id])?;
        self.json(self.request(Method::GET, url, token), "get post")
            .await
    }

    async fn get_posts(
        &self,
        query: &PostQuery,
        token: Option<&str>,
    ) -> ApiResult<Vec<PostQueryResult>> {
        let url = self.url_with_query(&["api", "post"], &query.to_query())?;
        self.json(self.request(Method::GET, url, token), "get posts")
            .await
    }

    async fn delete_post(&self, token: &str, id: &str) -> ApiResult<()> {
        let url = self.url(&["api", "post", id])?;
        self.send(self.request(Method::DELETE, url, Some(token)), "delete post")
            .await?;
        Ok(())
    }

    async fn react(&self, token: &str, id: &str, reaction: ReactionChoice) -> ApiResult<Post> {
        let url = self.url(&["api", "post", id, "react", reaction.as_str()])?;
        self.json(self.request(Method::POST, url, Some(token)), "react")
            .await
    }

    async fn upload_image(
        &self,
        token: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<String> {
        let mut params = QueryParams::new();
        params.text("format", Some(content_type));
        let url = self.url_with_query(&["api", "s3", "image"], &params)?;

        let target: ImageUploadTarget = self
            .json(
                self.request(Method::GET, url, Some(token)),
                "request image upload",
            )
            .await?;

        let put = Url::parse(&target.put)
            .map_err(|e| ApiError::Decode(format!("upload location {}: {}", target.put, e)))?;

        tracing::debug!("Uploading {} bytes of {}", bytes.len(), content_type);
        self.send(
            self.client
                .put(put)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes),
            "upload image",
        )
        .await?;

        Ok(target.get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::PostType;
    use crate::types::SortMode;

    #[test]
    fn test_url_joins_segments() {
        let api = HttpApi::new("https://hubs.example.org/", 30).unwrap();
        let url = api.url(&["api", "hub", "rust"]).unwrap();
        assert_eq!(url.as_str(), "https://hubs.example.org/api/hub/rust");
    }

    #[test]
    fn test_url_keeps_base_path() {
        let api = HttpApi::new("https://example.org/forum/", 30).unwrap();
        let url = api.url(&["api", "post", "p1"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/forum/api/post/p1");
    }

    #[test]
    fn test_url_encodes_segments() {
        let api = HttpApi::new("https://hubs.example.org", 30).unwrap();
        let url = api.url(&["api", "user", "ana maria/x"]).unwrap();
        assert_eq!(url.as_str(), "https://hubs.example.org/api/user/ana%20maria%2Fx");
    }

    #[test]
    fn test_url_with_query() {
        let api = HttpApi::new("https://hubs.example.org/", 30).unwrap();
        let query = PostQuery {
            limit: Some(20),
            post_type: Some(PostType::Topic),
            sort: Some(SortMode::Hot),
            after: Some("p 1".to_string()),
            ..Default::default()
        };
        let url = api.url_with_query(&["api", "post"], &query.to_query()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://hubs.example.org/api/post?limit=20&after=p+1&type=Topic&sort=hot"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpApi::new("not a url", 30),
            Err(ApiError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            HttpApi::new("mailto:admin@example.org", 30),
            Err(ApiError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let api = HttpApi::new("http://127.0.0.1:1/", 5).unwrap();
        let result = api.get_user("ana", None).await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }
}
