//! Mock forum service for testing
//!
//! `MockApi` keeps users, hubs, moderators and posts in memory and applies
//! the same filtering and cursor rules the real service does, so the
//! application layer can be driven end to end without a network. Failures
//! and latency are configurable per instance, and individual calls can be
//! made to fail with `fail_next`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::api::{ApiResult, ForumApi};
use crate::error::ApiError;
use crate::query::{HubQuery, ModeratorQuery, PostQuery, PostType, UserQuery, SUBSCRIPTIONS_HUB};
use crate::types::{
    Comment, CommentCreateData, Cursor, Hub, HubBase, HubPatch, HubQueryResult, LogInData,
    Moderator, ModeratorCreateData, Permissions, Post, PostQueryResult, Reaction, ReactionChoice,
    SignUpData, SortMode, Subscription, Topic, TopicCreateData, User, UserPatch, UserToken,
    MARKDOWN_CONTENT_TYPE,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn bump(counter: &Arc<Mutex<usize>>) {
    *lock(counter) += 1;
}

/// Configuration for mock service behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Whether token exchange, sign-in and sign-up succeed
    pub auth_succeeds: bool,

    /// Error message returned when authentication fails
    pub auth_error: Option<String>,

    /// Error returned by every call, if set
    pub fail_all: Option<ApiError>,

    /// Delay before completing each call (simulates network latency)
    pub delay: Duration,

    /// Number of times `auth` has been called
    pub auth_call_count: Arc<Mutex<usize>>,

    /// Number of times `login` has been called
    pub login_call_count: Arc<Mutex<usize>>,

    /// Number of times `get_posts` has been called
    pub get_posts_call_count: Arc<Mutex<usize>>,

    /// Queries passed to `get_posts`, in call order
    pub post_queries: Arc<Mutex<Vec<PostQuery>>>,

    /// Content type and size of every uploaded image
    pub uploads: Arc<Mutex<Vec<(String, usize)>>>,

    /// Errors handed out one per call before any other processing
    pub queued_failures: Arc<Mutex<VecDeque<ApiError>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            auth_succeeds: true,
            auth_error: None,
            fail_all: None,
            delay: Duration::from_millis(0),
            auth_call_count: Arc::new(Mutex::new(0)),
            login_call_count: Arc::new(Mutex::new(0)),
            get_posts_call_count: Arc::new(Mutex::new(0)),
            post_queries: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
            queued_failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

#[derive(Default)]
struct MockData {
    next_id: u64,
    users: Vec<User>,
    passwords: HashMap<String, String>,
    tokens: HashMap<String, String>,
    hubs: Vec<Hub>,
    subscriptions: Vec<Subscription>,
    moderators: Vec<Moderator>,
    /// Oldest first
    posts: Vec<Post>,
    reactions: HashMap<(String, String), Reaction>,
}

impl MockData {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn user_for_token(&self, token: &str) -> ApiResult<User> {
        self.tokens
            .get(token)
            .and_then(|id| self.users.iter().find(|u| &u.id == id))
            .cloned()
            .ok_or_else(|| ApiError::Authentication("Invalid token".to_string()))
    }

    fn optional_user(&self, token: Option<&str>) -> Option<User> {
        token.and_then(|t| self.user_for_token(t).ok())
    }

    fn user_by_name(&self, username: &str) -> ApiResult<User> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("user {}", username)))
    }

    fn hub_by_name(&self, name: &str) -> ApiResult<Hub> {
        self.hubs
            .iter()
            .find(|h| h.name == name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("hub {}", name)))
    }

    fn token_for(&self, user_id: &str) -> Option<String> {
        self.tokens
            .iter()
            .find(|(_, id)| id.as_str() == user_id)
            .map(|(token, _)| token.clone())
    }

    fn insert_user(&mut self, username: &str, password: &str, name: &str) -> ApiResult<UserToken> {
        if self.users.iter().any(|u| u.username == username) {
            return Err(ApiError::Status {
                status: 409,
                message: format!("username {} is taken", username),
            });
        }

        let now = Utc::now();
        let user = User {
            id: self.next_id("u"),
            created_at: now,
            last_modified: now,
            username: username.to_string(),
            name: name.to_string(),
            image_url: None,
            status: None,
        };
        let token = format!("token-{}", username);

        self.passwords
            .insert(username.to_string(), password.to_string());
        self.tokens.insert(token.clone(), user.id.clone());
        self.users.push(user.clone());

        Ok(UserToken { user, token })
    }

    fn permissions(&self, user: Option<&User>, hub: &Hub) -> Permissions {
        match user {
            Some(user) if user.id == hub.owner_id => Permissions {
                can_edit: true,
                can_delete_posts: true,
            },
            Some(user) => self
                .moderators
                .iter()
                .find(|m| m.hub_id == hub.id && m.user_id == user.id)
                .map(Moderator::permissions)
                .unwrap_or_default(),
            None => Permissions::default(),
        }
    }

    fn require_owner(&self, user: &User, hub: &Hub) -> ApiResult<()> {
        if user.id == hub.owner_id {
            Ok(())
        } else {
            Err(ApiError::Authentication(format!(
                "{} does not own hub {}",
                user.username, hub.name
            )))
        }
    }

    fn post_index(&self, id: &str) -> ApiResult<usize> {
        self.posts
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| ApiError::NotFound(format!("post {}", id)))
    }

    fn with_reaction(&self, post: Post, user: Option<&User>) -> PostQueryResult {
        let reaction = user.and_then(|u| {
            self.reactions
                .get(&(u.id.clone(), post.id().to_string()))
                .copied()
        });
        PostQueryResult { reaction, post }
    }
}

fn counters(post: &mut Post) -> (&mut i64, &mut i64) {
    match post {
        Post::Topic(topic) => (&mut topic.likes, &mut topic.dislikes),
        Post::Comment(comment) => (&mut comment.likes, &mut comment.dislikes),
    }
}

fn score(post: &Post) -> i64 {
    match post {
        Post::Topic(topic) => topic.likes - topic.dislikes,
        Post::Comment(comment) => comment.likes - comment.dislikes,
    }
}

fn comments_count(post: &Post) -> u64 {
    match post {
        Post::Topic(topic) => topic.comments_count,
        Post::Comment(comment) => comment.comments_count,
    }
}

/// Apply `after`, `page` and `limit` the way the service does
///
/// An `after` cursor that matches nothing yields an empty page.
fn paginate<T: Cursor>(
    items: Vec<T>,
    after: Option<&str>,
    page: Option<u32>,
    limit: Option<u32>,
) -> Vec<T> {
    let mut items = items;

    if let Some(after) = after.filter(|a| !a.is_empty()) {
        match items.iter().position(|item| item.cursor() == after) {
            Some(pos) => {
                items.drain(..=pos);
            }
            None => return Vec::new(),
        }
    }

    let limit = limit.map(|l| l as usize);
    let skip = match (page, limit) {
        (Some(page), Some(limit)) => page as usize * limit,
        _ => 0,
    };

    items
        .into_iter()
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

/// In-memory forum service
pub struct MockApi {
    config: MockConfig,
    data: Mutex<MockData>,
}

impl MockApi {
    /// Create a new mock service with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            data: Mutex::new(MockData::default()),
        }
    }

    /// Create a mock service where everything succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// Create a mock service that rejects every token and credential
    pub fn auth_failure(error: &str) -> Self {
        Self::new(MockConfig {
            auth_succeeds: false,
            auth_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// Create a mock service where every call fails with `error`
    pub fn failing(error: ApiError) -> Self {
        Self::new(MockConfig {
            fail_all: Some(error),
            ..Default::default()
        })
    }

    /// Create a mock service with a delay on every call
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: ApiError) {
        lock(&self.config.queued_failures).push_back(error);
    }

    pub fn auth_call_count(&self) -> usize {
        *lock(&self.config.auth_call_count)
    }

    pub fn login_call_count(&self) -> usize {
        *lock(&self.config.login_call_count)
    }

    pub fn get_posts_call_count(&self) -> usize {
        *lock(&self.config.get_posts_call_count)
    }

    pub fn post_queries(&self) -> Vec<PostQuery> {
        lock(&self.config.post_queries).clone()
    }

    pub fn uploads(&self) -> Vec<(String, usize)> {
        lock(&self.config.uploads).clone()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Register a user; the returned token is accepted by every call
    pub fn add_user(&self, username: &str, password: &str) -> ApiResult<UserToken> {
        lock(&self.data).insert_user(username, password, username)
    }

    pub fn add_hub(&self, name: &str, owner: &str, is_nsfw: bool) -> ApiResult<Hub> {
        let mut data = lock(&self.data);
        let owner = data.user_by_name(owner)?;
        let now = Utc::now();
        let hub = Hub {
            id: data.next_id("h"),
            created_at: now,
            last_modified: now,
            owner_id: owner.id.clone(),
            owner: Some(owner),
            name: name.to_string(),
            description: String::new(),
            image_url: String::new(),
            is_nsfw,
            banner_color: 0,
            subscribers_count: 0,
        };
        data.hubs.push(hub.clone());
        Ok(hub)
    }

    pub fn add_topic(&self, hub: &str, owner: &str, title: &str, tags: &str) -> ApiResult<Post> {
        let mut data = lock(&self.data);
        let owner = data.user_by_name(owner)?;
        let hub = data.hub_by_name(hub)?;
        let post = Self::new_topic(
            &mut data,
            &owner,
            &hub,
            &TopicCreateData {
                title: title.to_string(),
                tags: tags.to_string(),
                content: String::new(),
                content_type: MARKDOWN_CONTENT_TYPE,
                is_nsfw: hub.is_nsfw,
            },
        );
        Ok(post)
    }

    pub fn add_comment(&self, parent_id: &str, owner: &str, content: &str) -> ApiResult<Post> {
        let mut data = lock(&self.data);
        let owner = data.user_by_name(owner)?;
        Self::new_comment(
            &mut data,
            &owner,
            parent_id,
            &CommentCreateData {
                content: content.to_string(),
                content_type: MARKDOWN_CONTENT_TYPE,
                is_nsfw: false,
            },
        )
    }

    /// Set raw like/dislike counters on a post
    pub fn set_votes(&self, post_id: &str, likes: i64, dislikes: i64) -> ApiResult<()> {
        let mut data = lock(&self.data);
        let index = data.post_index(post_id)?;
        let (l, d) = counters(&mut data.posts[index]);
        *l = likes;
        *d = dislikes;
        Ok(())
    }

    fn new_topic(data: &mut MockData, owner: &User, hub: &Hub, input: &TopicCreateData) -> Post {
        let now = Utc::now();
        let post = Post::Topic(Topic {
            id: data.next_id("p"),
            created_at: now,
            last_modified: now,
            owner_id: owner.id.clone(),
            owner: Some(owner.clone()),
            hub_id: hub.id.clone(),
            hub: Some(hub.clone()),
            content: input.content.clone(),
            content_type: input.content_type,
            is_nsfw: input.is_nsfw || hub.is_nsfw,
            likes: 0,
            dislikes: 0,
            comments_count: 0,
            title: input.title.clone(),
            tags: input.tags.clone(),
            stickied: false,
            locked: 0,
        });
        data.posts.push(post.clone());
        post
    }

    fn new_comment(
        data: &mut MockData,
        owner: &User,
        parent_id: &str,
        input: &CommentCreateData,
    ) -> ApiResult<Post> {
        let parent_index = data.post_index(parent_id)?;
        let parent = data.posts[parent_index].clone();

        match &mut data.posts[parent_index] {
            Post::Topic(topic) => topic.comments_count += 1,
            Post::Comment(comment) => comment.comments_count += 1,
        }

        let now = Utc::now();
        let post = Post::Comment(Comment {
            id: data.next_id("p"),
            created_at: now,
            last_modified: now,
            owner_id: owner.id.clone(),
            owner: Some(owner.clone()),
            hub_id: parent.hub_id().to_string(),
            hub: None,
            content: input.content.clone(),
            content_type: input.content_type,
            is_nsfw: input.is_nsfw || parent.is_nsfw(),
            likes: 0,
            dislikes: 0,
            comments_count: 0,
            parent_id: parent.id().to_string(),
            parent: Some(Box::new(parent)),
        });
        data.posts.push(post.clone());
        Ok(post)
    }

    /// Common prologue of every call: count, wait, then maybe fail
    async fn enter(&self, counter: Option<&Arc<Mutex<usize>>>) -> ApiResult<()> {
        if let Some(counter) = counter {
            bump(counter);
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = lock(&self.config.queued_failures).pop_front() {
            return Err(error);
        }

        match &self.config.fail_all {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn check_auth_allowed(&self) -> ApiResult<()> {
        if self.config.auth_succeeds {
            Ok(())
        } else {
            Err(ApiError::Authentication(
                self.config
                    .auth_error
                    .clone()
                    .unwrap_or_else(|| "Mock authentication failed".to_string()),
            ))
        }
    }
}

#[async_trait]
impl ForumApi for MockApi {
    async fn auth(&self, token: &str) -> ApiResult<UserToken> {
        self.enter(Some(&self.config.auth_call_count)).await?;
        self.check_auth_allowed()?;

        let data = lock(&self.data);
        let user = data.user_for_token(token)?;
        Ok(UserToken {
            user,
            token: token.to_string(),
        })
    }

    async fn login(&self, input: &LogInData) -> ApiResult<UserToken> {
        self.enter(Some(&self.config.login_call_count)).await?;
        self.check_auth_allowed()?;

        let data = lock(&self.data);
        let valid = data
            .passwords
            .get(&input.username)
            .map(|p| p == &input.password)
            .unwrap_or(false);
        if !valid {
            return Err(ApiError::Authentication(
                "Invalid username or password".to_string(),
            ));
        }

        let user = data.user_by_name(&input.username)?;
        let token = data
            .token_for(&user.id)
            .ok_or_else(|| ApiError::Authentication("No session".to_string()))?;
        Ok(UserToken { user, token })
    }

    async fn create_account(&self, input: &SignUpData) -> ApiResult<UserToken> {
        self.enter(None).await?;
        self.check_auth_allowed()?;

        if input.username.is_empty() || input.password.is_empty() {
            return Err(ApiError::Status {
                status: 400,
                message: "username and password are required".to_string(),
            });
        }

        lock(&self.data).insert_user(&input.username, &input.password, &input.name)
    }

    async fn get_user(&self, username: &str, _token: Option<&str>) -> ApiResult<User> {
        self.enter(None).await?;
        lock(&self.data).user_by_name(username)
    }

    async fn get_users(&self, query: &UserQuery, _token: Option<&str>) -> ApiResult<Vec<User>> {
        self.enter(None).await?;
        let data = lock(&self.data);
        let users: Vec<User> = data
            .users
            .iter()
            .filter(|u| query.name.as_deref().map_or(true, |n| u.name.contains(n)))
            .filter(|u| {
                query
                    .username
                    .as_deref()
                    .map_or(true, |n| u.username.contains(n))
            })
            .cloned()
            .collect();
        Ok(paginate(users, query.after.as_deref(), query.page, query.limit))
    }

    async fn patch_user(&self, token: &str, username: &str, patch: &UserPatch) -> ApiResult<User> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        if caller.username != username {
            return Err(ApiError::Authentication(format!(
                "{} cannot edit {}",
                caller.username, username
            )));
        }

        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == caller.id)
            .ok_or_else(|| ApiError::NotFound(format!("user {}", username)))?;
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if patch.status.is_some() {
            user.status = patch.status.clone();
        }
        if patch.image_url.is_some() {
            user.image_url = patch.image_url.clone();
        }
        user.last_modified = Utc::now();
        Ok(user.clone())
    }

    async fn create_hub(&self, token: &str, input: &HubBase) -> ApiResult<Hub> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let owner = data.user_for_token(token)?;
        if input.name.is_empty() || input.name.starts_with('_') {
            return Err(ApiError::Status {
                status: 400,
                message: format!("invalid hub name '{}'", input.name),
            });
        }
        if data.hubs.iter().any(|h| h.name == input.name) {
            return Err(ApiError::Status {
                status: 409,
                message: format!("hub {} exists", input.name),
            });
        }

        let now = Utc::now();
        let hub = Hub {
            id: data.next_id("h"),
            created_at: now,
            last_modified: now,
            owner_id: owner.id.clone(),
            owner: Some(owner),
            name: input.name.clone(),
            description: input.description.clone(),
            image_url: input.image_url.clone(),
            is_nsfw: input.is_nsfw,
            banner_color: input.banner_color,
            subscribers_count: 0,
        };
        data.hubs.push(hub.clone());
        Ok(hub)
    }

    async fn get_hub(&self, name: &str, token: Option<&str>) -> ApiResult<HubQueryResult> {
        self.enter(None).await?;
        let data = lock(&self.data);
        let hub = data.hub_by_name(name)?;
        let caller = data.optional_user(token);

        let subscribed = caller.as_ref().map_or(false, |user| {
            data.subscriptions
                .iter()
                .any(|s| s.hub_id == hub.id && s.user_id == user.id)
        });
        let permissions = data.permissions(caller.as_ref(), &hub);

        Ok(HubQueryResult {
            subscribed,
            permissions,
            hub,
        })
    }

    async fn get_hubs(&self, query: &HubQuery, _token: Option<&str>) -> ApiResult<Vec<Hub>> {
        self.enter(None).await?;
        let data = lock(&self.data);
        let owner_id = match query.owner.as_deref().filter(|o| !o.is_empty()) {
            Some(owner) => Some(data.user_by_name(owner)?.id),
            None => None,
        };

        let hubs: Vec<Hub> = data
            .hubs
            .iter()
            .filter(|h| query.name.as_deref().map_or(true, |n| h.name.contains(n)))
            .filter(|h| owner_id.as_deref().map_or(true, |id| h.owner_id == id))
            .cloned()
            .collect();
        Ok(paginate(hubs, query.after.as_deref(), query.page, query.limit))
    }

    async fn patch_hub(&self, token: &str, name: &str, patch: &HubPatch) -> ApiResult<Hub> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let hub = data.hub_by_name(name)?;
        if !data.permissions(Some(&caller), &hub).can_edit {
            return Err(ApiError::Authentication(format!(
                "{} cannot edit hub {}",
                caller.username, name
            )));
        }

        let hub = data
            .hubs
            .iter_mut()
            .find(|h| h.name == name)
            .ok_or_else(|| ApiError::NotFound(format!("hub {}", name)))?;
        if let Some(description) = &patch.description {
            hub.description = description.clone();
        }
        if let Some(image_url) = &patch.image_url {
            hub.image_url = image_url.clone();
        }
        if let Some(color) = patch.banner_color {
            hub.banner_color = color;
        }
        hub.last_modified = Utc::now();
        Ok(hub.clone())
    }

    async fn delete_hub(&self, token: &str, name: &str) -> ApiResult<()> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let hub = data.hub_by_name(name)?;
        data.require_owner(&caller, &hub)?;

        data.hubs.retain(|h| h.id != hub.id);
        data.posts.retain(|p| p.hub_id() != hub.id);
        data.subscriptions.retain(|s| s.hub_id != hub.id);
        data.moderators.retain(|m| m.hub_id != hub.id);
        Ok(())
    }

    async fn subscribe(&self, token: &str, hub: &str) -> ApiResult<Subscription> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let hub = data.hub_by_name(hub)?;

        if let Some(existing) = data
            .subscriptions
            .iter()
            .find(|s| s.hub_id == hub.id && s.user_id == caller.id)
        {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let subscription = Subscription {
            id: data.next_id("s"),
            created_at: now,
            last_modified: now,
            hub_id: hub.id.clone(),
            user_id: caller.id.clone(),
            hub: Some(hub.clone()),
            user: Some(caller),
        };
        data.subscriptions.push(subscription.clone());
        if let Some(h) = data.hubs.iter_mut().find(|h| h.id == hub.id) {
            h.subscribers_count += 1;
        }
        Ok(subscription)
    }

    async fn unsubscribe(&self, token: &str, hub: &str) -> ApiResult<()> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let hub = data.hub_by_name(hub)?;

        let before = data.subscriptions.len();
        data.subscriptions
            .retain(|s| !(s.hub_id == hub.id && s.user_id == caller.id));
        if data.subscriptions.len() < before {
            if let Some(h) = data.hubs.iter_mut().find(|h| h.id == hub.id) {
                h.subscribers_count = h.subscribers_count.saturating_sub(1);
            }
        }
        Ok(())
    }

    async fn get_moderators(&self, query: &ModeratorQuery) -> ApiResult<Vec<Moderator>> {
        self.enter(None).await?;
        let data = lock(&self.data);
        let hub_id = match query.hub.as_deref().filter(|h| !h.is_empty()) {
            Some(hub) => Some(data.hub_by_name(hub)?.id),
            None => None,
        };
        let user_id = match query.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => Some(data.user_by_name(username)?.id),
            None => None,
        };

        let moderators: Vec<Moderator> = data
            .moderators
            .iter()
            .filter(|m| hub_id.as_deref().map_or(true, |id| m.hub_id == id))
            .filter(|m| user_id.as_deref().map_or(true, |id| m.user_id == id))
            .cloned()
            .collect();
        Ok(paginate(
            moderators,
            query.after.as_deref(),
            query.page,
            query.limit,
        ))
    }

    async fn create_moderator(
        &self,
        token: &str,
        input: &ModeratorCreateData,
    ) -> ApiResult<Moderator> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let hub = data.hub_by_name(&input.hub)?;
        data.require_owner(&caller, &hub)?;
        let user = data.user_by_name(&input.username)?;

        if data
            .moderators
            .iter()
            .any(|m| m.hub_id == hub.id && m.user_id == user.id)
        {
            return Err(ApiError::Status {
                status: 409,
                message: format!("{} already moderates {}", user.username, hub.name),
            });
        }

        let now = Utc::now();
        let moderator = Moderator {
            id: data.next_id("m"),
            created_at: now,
            last_modified: now,
            hub_id: hub.id.clone(),
            hub: Some(hub),
            user_id: user.id.clone(),
            user: Some(user),
            can_edit: input.permissions.can_edit,
            can_delete_posts: input.permissions.can_delete_posts,
        };
        data.moderators.push(moderator.clone());
        Ok(moderator)
    }

    async fn patch_moderator(
        &self,
        token: &str,
        id: &str,
        permissions: &Permissions,
    ) -> ApiResult<Moderator> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let hub_id = data
            .moderators
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.hub_id.clone())
            .ok_or_else(|| ApiError::NotFound(format!("moderator {}", id)))?;
        let hub = data
            .hubs
            .iter()
            .find(|h| h.id == hub_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("hub {}", hub_id)))?;
        data.require_owner(&caller, &hub)?;

        let moderator = data
            .moderators
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("moderator {}", id)))?;
        moderator.can_edit = permissions.can_edit;
        moderator.can_delete_posts = permissions.can_delete_posts;
        moderator.last_modified = Utc::now();
        Ok(moderator.clone())
    }

    async fn delete_moderator(&self, token: &str, id: &str) -> ApiResult<()> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let moderator = data
            .moderators
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("moderator {}", id)))?;

        // Moderators may step down; otherwise only the owner removes them
        if moderator.user_id != caller.id {
            let hub = data
                .hubs
                .iter()
                .find(|h| h.id == moderator.hub_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("hub {}", moderator.hub_id)))?;
            data.require_owner(&caller, &hub)?;
        }

        data.moderators.retain(|m| m.id != id);
        Ok(())
    }

    async fn create_topic(&self, token: &str, hub: &str, input: &TopicCreateData) -> ApiResult<Post> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let hub = data.hub_by_name(hub)?;
        if input.title.trim().is_empty() {
            return Err(ApiError::Status {
                status: 400,
                message: "title is required".to_string(),
            });
        }
        Ok(Self::new_topic(&mut data, &caller, &hub, input))
    }

    async fn create_comment(
        &self,
        token: &str,
        parent_id: &str,
        input: &CommentCreateData,
    ) -> ApiResult<Post> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        Self::new_comment(&mut data, &caller, parent_id, input)
    }

    async fn get_post(&self, id: &str, token: Option<&str>) -> ApiResult<PostQueryResult> {
        self.enter(None).await?;
        let data = lock(&self.data);
        let index = data.post_index(id)?;
        let caller = data.optional_user(token);
        Ok(data.with_reaction(data.posts[index].clone(), caller.as_ref()))
    }

    async fn get_posts(
        &self,
        query: &PostQuery,
        token: Option<&str>,
    ) -> ApiResult<Vec<PostQueryResult>> {
        lock(&self.config.post_queries).push(query.clone());
        self.enter(Some(&self.config.get_posts_call_count)).await?;

        let data = lock(&self.data);
        let caller = data.optional_user(token);

        let hub_ids: Option<Vec<String>> = match query.hub.as_deref().filter(|h| !h.is_empty()) {
            Some(SUBSCRIPTIONS_HUB) => {
                let caller = caller
                    .as_ref()
                    .ok_or_else(|| ApiError::Authentication("Sign in to see subscriptions".to_string()))?;
                Some(
                    data.subscriptions
                        .iter()
                        .filter(|s| s.user_id == caller.id)
                        .map(|s| s.hub_id.clone())
                        .collect(),
                )
            }
            Some(hub) => Some(vec![data.hub_by_name(hub)?.id]),
            None => None,
        };
        let owner_id = match query.owner.as_deref().filter(|o| !o.is_empty()) {
            Some(owner) => Some(data.user_by_name(owner)?.id),
            None => None,
        };
        let include_nsfw = query.nsfw == Some(true);

        // Newest first is the base order for every sort
        let mut posts: Vec<Post> = data
            .posts
            .iter()
            .rev()
            .filter(|p| match query.post_type {
                Some(PostType::Topic) => p.as_topic().is_some(),
                Some(PostType::Comment) => p.as_comment().is_some(),
                None => true,
            })
            .filter(|p| {
                hub_ids
                    .as_ref()
                    .map_or(true, |ids| ids.iter().any(|id| id == p.hub_id()))
            })
            .filter(|p| {
                query.parent.as_deref().map_or(true, |parent| {
                    p.as_comment().map_or(false, |c| c.parent_id == parent)
                })
            })
            .filter(|p| owner_id.as_deref().map_or(true, |id| p.owner_id() == id))
            .filter(|p| {
                query.title.as_deref().map_or(true, |title| {
                    p.as_topic().map_or(false, |t| t.title.contains(title))
                })
            })
            .filter(|p| include_nsfw || !p.is_nsfw())
            .cloned()
            .collect();

        match query.sort {
            Some(SortMode::Top) => posts.sort_by_key(|p| std::cmp::Reverse(score(p))),
            Some(SortMode::Hot) => posts.sort_by_key(|p| {
                std::cmp::Reverse(score(p) + comments_count(p) as i64)
            }),
            Some(SortMode::New) | None => {}
        }

        let page = paginate(posts, query.after.as_deref(), query.page, query.limit);
        Ok(page
            .into_iter()
            .map(|post| data.with_reaction(post, caller.as_ref()))
            .collect())
    }

    async fn delete_post(&self, token: &str, id: &str) -> ApiResult<()> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let index = data.post_index(id)?;
        let post = &data.posts[index];

        let allowed = post.owner_id() == caller.id || {
            let hub_id = post.hub_id().to_string();
            data.hubs
                .iter()
                .find(|h| h.id == hub_id)
                .map_or(false, |hub| data.permissions(Some(&caller), hub).can_delete_posts)
        };
        if !allowed {
            return Err(ApiError::Authentication(format!(
                "{} cannot delete post {}",
                caller.username, id
            )));
        }

        data.posts.remove(index);
        Ok(())
    }

    async fn react(&self, token: &str, id: &str, reaction: ReactionChoice) -> ApiResult<Post> {
        self.enter(None).await?;
        let mut data = lock(&self.data);
        let caller = data.user_for_token(token)?;
        let index = data.post_index(id)?;

        let key = (caller.id.clone(), id.to_string());
        let previous = data.reactions.remove(&key);
        let next = match reaction {
            ReactionChoice::Like => Some(Reaction::Like),
            ReactionChoice::Dislike => Some(Reaction::Dislike),
            ReactionChoice::Clear => None,
        };
        if let Some(next) = next {
            data.reactions.insert(key, next);
        }

        let (likes, dislikes) = counters(&mut data.posts[index]);
        match previous {
            Some(Reaction::Like) => *likes -= 1,
            Some(Reaction::Dislike) => *dislikes -= 1,
            None => {}
        }
        match next {
            Some(Reaction::Like) => *likes += 1,
            Some(Reaction::Dislike) => *dislikes += 1,
            None => {}
        }

        Ok(data.posts[index].clone())
    }

    async fn upload_image(
        &self,
        token: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<String> {
        self.enter(None).await?;
        let id = {
            let mut data = lock(&self.data);
            data.user_for_token(token)?;
            data.next_id("img")
        };

        let mut uploads = lock(&self.config.uploads);
        uploads.push((content_type.to_string(), bytes.len()));
        let extension = content_type.rsplit('/').next().unwrap_or("bin");
        Ok(format!("https://images.example.org/{}.{}", id, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MockApi, UserToken) {
        let api = MockApi::success();
        let ana = api.add_user("ana", "secret").unwrap();
        api.add_user("bo", "pw").unwrap();
        api.add_hub("rust", "ana", false).unwrap();
        api.add_hub("after-dark", "bo", true).unwrap();
        (api, ana)
    }

    #[tokio::test]
    async fn test_login_and_auth() {
        let (api, ana) = seeded();

        let session = api
            .login(&LogInData {
                username: "ana".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.token, ana.token);

        let restored = api.auth(&ana.token).await.unwrap();
        assert_eq!(restored.user.username, "ana");
        assert_eq!(api.auth_call_count(), 1);
        assert_eq!(api.login_call_count(), 1);

        let bad = api
            .login(&LogInData {
                username: "ana".to_string(),
                password: "nope".to_string(),
            })
            .await;
        assert!(matches!(bad, Err(ApiError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_auth_failure_config() {
        let api = MockApi::auth_failure("token expired");
        let ana = api.add_user("ana", "secret").unwrap();
        let result = api.auth(&ana.token).await;
        assert_eq!(
            result,
            Err(ApiError::Authentication("token expired".to_string()))
        );
    }

    #[tokio::test]
    async fn test_posts_after_cursor_and_limit() {
        let (api, _) = seeded();
        for i in 0..5 {
            api.add_topic("rust", "ana", &format!("topic {}", i), "").unwrap();
        }

        let first = api
            .get_posts(
                &PostQuery {
                    limit: Some(2),
                    sort: Some(SortMode::New),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        let titles: Vec<_> = first
            .iter()
            .map(|r| r.post.as_topic().unwrap().title.clone())
            .collect();
        assert_eq!(titles, vec!["topic 4", "topic 3"]);

        let next = api
            .get_posts(
                &PostQuery {
                    limit: Some(2),
                    sort: Some(SortMode::New),
                    after: Some(first[1].cursor().to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        let titles: Vec<_> = next
            .iter()
            .map(|r| r.post.as_topic().unwrap().title.clone())
            .collect();
        assert_eq!(titles, vec!["topic 2", "topic 1"]);
        assert_eq!(api.get_posts_call_count(), 2);
        assert_eq!(api.post_queries()[1].after.as_deref(), Some(first[1].cursor()));
    }

    #[tokio::test]
    async fn test_nsfw_posts_hidden_unless_requested() {
        let (api, _) = seeded();
        api.add_topic("after-dark", "bo", "spicy", "").unwrap();
        api.add_topic("rust", "ana", "tame", "").unwrap();

        let default = api.get_posts(&PostQuery::default(), None).await.unwrap();
        assert_eq!(default.len(), 1);

        let all = api
            .get_posts(
                &PostQuery {
                    nsfw: Some(true),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_subscriptions_feed_requires_token() {
        let (api, ana) = seeded();
        api.add_topic("rust", "ana", "in rust", "").unwrap();
        api.add_topic("after-dark", "bo", "elsewhere", "").unwrap();
        api.subscribe(&ana.token, "rust").await.unwrap();

        let query = PostQuery {
            hub: Some(SUBSCRIPTIONS_HUB.to_string()),
            nsfw: Some(true),
            ..Default::default()
        };
        let feed = api.get_posts(&query, Some(&ana.token)).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].post.as_topic().unwrap().title, "in rust");

        let anonymous = api.get_posts(&query, None).await;
        assert!(matches!(anonymous, Err(ApiError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_react_updates_counters_and_reaction() {
        let (api, ana) = seeded();
        let post = api.add_topic("rust", "bo", "vote", "").unwrap();

        api.react(&ana.token, post.id(), ReactionChoice::Like).await.unwrap();
        let updated = api
            .react(&ana.token, post.id(), ReactionChoice::Dislike)
            .await
            .unwrap();
        let topic = updated.as_topic().unwrap();
        assert_eq!((topic.likes, topic.dislikes), (0, 1));

        let fetched = api.get_post(post.id(), Some(&ana.token)).await.unwrap();
        assert_eq!(fetched.reaction, Some(Reaction::Dislike));

        let anonymous = api.get_post(post.id(), None).await.unwrap();
        assert_eq!(anonymous.reaction, None);
    }

    #[tokio::test]
    async fn test_comments_filter_by_parent() {
        let (api, ana) = seeded();
        let topic = api.add_topic("rust", "ana", "root", "").unwrap();
        api.add_comment(topic.id(), "bo", "first").unwrap();
        let created = api
            .create_comment(
                &ana.token,
                topic.id(),
                &CommentCreateData {
                    content: "second".to_string(),
                    content_type: MARKDOWN_CONTENT_TYPE,
                    is_nsfw: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(created.as_comment().unwrap().parent_id, topic.id());

        let replies = api
            .get_posts(
                &PostQuery {
                    parent: Some(topic.id().to_string()),
                    post_type: Some(PostType::Comment),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(replies.len(), 2);

        let root = api.get_post(topic.id(), None).await.unwrap();
        assert_eq!(root.post.as_topic().unwrap().comments_count, 2);
    }

    #[tokio::test]
    async fn test_hub_permissions() {
        let (api, ana) = seeded();
        let bo = api
            .login(&LogInData {
                username: "bo".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();

        let moderator = api
            .create_moderator(
                &ana.token,
                &ModeratorCreateData {
                    hub: "rust".to_string(),
                    username: "bo".to_string(),
                    permissions: Permissions {
                        can_edit: false,
                        can_delete_posts: true,
                    },
                },
            )
            .await
            .unwrap();

        let as_bo = api.get_hub("rust", Some(&bo.token)).await.unwrap();
        assert!(as_bo.permissions.can_delete_posts);
        assert!(!as_bo.permissions.can_edit);

        let as_owner = api.get_hub("rust", Some(&ana.token)).await.unwrap();
        assert!(as_owner.permissions.can_edit);

        let denied = api
            .patch_moderator(&bo.token, &moderator.id, &Permissions::default())
            .await;
        assert!(matches!(denied, Err(ApiError::Authentication(_))));

        api.delete_moderator(&bo.token, &moderator.id).await.unwrap();
        assert!(api
            .get_moderators(&ModeratorQuery::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let (api, _) = seeded();
        api.fail_next(ApiError::Network("offline".to_string()));

        let first = api.get_posts(&PostQuery::default(), None).await;
        assert_eq!(first, Err(ApiError::Network("offline".to_string())));
        assert!(api.get_posts(&PostQuery::default(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_upload_image_requires_token() {
        let (api, ana) = seeded();
        let url = api
            .upload_image(&ana.token, vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert!(url.ends_with(".png"));
        assert_eq!(api.uploads(), vec![("image/png".to_string(), 3)]);

        let denied = api.upload_image("bogus", vec![1], "image/png").await;
        assert!(matches!(denied, Err(ApiError::Authentication(_))));
    }

    #[test]
    fn test_paginate_unknown_cursor_is_empty() {
        let (api, _) = seeded();
        let hub = api.add_hub("misc", "ana", false).unwrap();
        let page = paginate(vec![hub], Some("missing"), None, None);
        assert!(page.is_empty());
    }
}
