//! Post feeds
//!
//! A `PostFeed` is a list loader over `get_posts` for one source: the
//! signed-in user's subscriptions, a hub, a user's posts, or the replies
//! to a post. Changing the sort reloads from the first page; scrolling
//! fetches the next page after the last loaded post. Tag filtering happens
//! locally on what has been loaded.

use libhubs::api::session::ApiSession;
use libhubs::config::DefaultsConfig;
use libhubs::query::{PostQuery, PostType, SUBSCRIPTIONS_HUB};
use libhubs::types::{CommentCreateData, Post, PostQueryResult, SortMode, TopicCreateData};

use crate::app::AppState;
use crate::error::{AppError, Result};
use crate::fetch::CancelHandle;
use crate::list::{ListLoader, ListState, ListStatus};
use crate::visibility::LoadMoreTrigger;

/// Where a feed's posts come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// Topics from every hub the caller subscribes to
    Subscriptions,
    /// Topics in one hub
    Hub(String),
    /// Posts by one user
    User(String),
    /// Comments replying to one post
    Replies(String),
}

impl FeedSource {
    /// Query for one page
    pub fn query(&self, sort: SortMode, limit: u32, after: Option<String>, nsfw: bool) -> PostQuery {
        let base = PostQuery {
            limit: Some(limit),
            after,
            sort: Some(sort),
            nsfw: Some(nsfw),
            ..Default::default()
        };

        match self {
            FeedSource::Subscriptions => PostQuery {
                hub: Some(SUBSCRIPTIONS_HUB.to_string()),
                post_type: Some(PostType::Topic),
                ..base
            },
            FeedSource::Hub(name) => PostQuery {
                hub: Some(name.clone()),
                post_type: Some(PostType::Topic),
                ..base
            },
            FeedSource::User(username) => PostQuery {
                owner: Some(username.clone()),
                ..base
            },
            // Replies are always listed in the service's default order
            FeedSource::Replies(parent) => PostQuery {
                parent: Some(parent.clone()),
                post_type: Some(PostType::Comment),
                sort: None,
                ..base
            },
        }
    }

    pub fn page_size(&self, defaults: &DefaultsConfig) -> u32 {
        match self {
            FeedSource::Replies(_) => defaults.reply_page_size,
            _ => defaults.page_size,
        }
    }
}

#[derive(Debug)]
pub struct PostFeed {
    source: FeedSource,
    sort: SortMode,
    page_size: u32,
    show_nsfw: bool,
    tags: Vec<String>,
    loader: ListLoader<PostQueryResult>,
    trigger: LoadMoreTrigger,
}

impl PostFeed {
    pub fn new(source: FeedSource, sort: SortMode, page_size: u32) -> Self {
        Self::with_cancel(source, sort, page_size, CancelHandle::new())
    }

    /// Feed whose late pages are dropped once `cancel` fires
    pub fn with_cancel(
        source: FeedSource,
        sort: SortMode,
        page_size: u32,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            source,
            sort,
            page_size,
            show_nsfw: false,
            tags: Vec::new(),
            loader: ListLoader::with_cancel(Vec::new(), cancel),
            trigger: LoadMoreTrigger::new(),
        }
    }

    /// Feed using the store's sort and explicit-content preference
    pub fn from_state(source: FeedSource, state: &AppState, defaults: &DefaultsConfig) -> Self {
        let page_size = source.page_size(defaults);
        let mut feed = Self::new(source, state.sort, page_size);
        feed.show_nsfw = state.show_nsfw;
        feed
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Applies from the next request on
    pub fn set_show_nsfw(&mut self, show_nsfw: bool) {
        self.show_nsfw = show_nsfw;
    }

    pub fn loader(&self) -> &ListLoader<PostQueryResult> {
        &self.loader
    }

    pub fn state(&self) -> ListState<PostQueryResult> {
        self.loader.state()
    }

    /// Switch ordering and reload from the first page
    pub async fn sort_by(&mut self, sort: SortMode, api: &ApiSession) -> ListStatus {
        self.sort = sort;
        let query = self.source.query(sort, self.page_size, None, self.show_nsfw);
        tracing::debug!("Loading {:?} sorted by {}", self.source, sort);

        let status = self.loader.reload(|| api.get_posts(&query)).await;
        self.trigger.rearm();
        status
    }

    /// Reload with the current ordering
    pub async fn refresh(&mut self, api: &ApiSession) -> ListStatus {
        self.sort_by(self.sort, api).await
    }

    /// Fetch the page after the last loaded post
    ///
    /// Returns without fetching while another page is in flight.
    pub async fn more(&self, api: &ApiSession) -> ListStatus {
        let query = self
            .source
            .query(self.sort, self.page_size, self.loader.after(), self.show_nsfw);
        self.loader.more(|| api.get_posts(&query)).await
    }

    /// Report whether the end of the feed is on screen
    ///
    /// Loads the next page when the end just came into view and the feed
    /// can take one. Returns the status of that load, if any.
    pub async fn observe_end(&mut self, visible: bool, api: &ApiSession) -> Option<ListStatus> {
        let state = self.loader.state();
        if !self.trigger.observe(visible, &state) {
            return None;
        }

        let status = self.more(api).await;
        self.trigger.rearm();
        Some(status)
    }

    // Tag filter

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Add a tag to the filter, making it the last one
    pub fn add_tag(&mut self, tag: &str) {
        self.tags.retain(|existing| existing != tag);
        self.tags.push(tag.to_string());
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|existing| existing != tag);
    }

    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }

    /// Loaded posts that pass the tag filter
    ///
    /// With no tags everything loaded is visible. With tags, only topics
    /// carrying every tag are.
    pub fn visible(&self) -> Vec<PostQueryResult> {
        let items = self.loader.items();
        if self.tags.is_empty() {
            return items;
        }

        items
            .into_iter()
            .filter(|result| match result.post.as_topic() {
                Some(topic) => {
                    let topic_tags = topic.tag_list();
                    self.tags.iter().all(|tag| topic_tags.contains(&tag.as_str()))
                }
                None => false,
            })
            .collect()
    }

    // Creation

    /// Show a post created by the caller at the head of the feed
    pub fn prepend(&self, post: Post) {
        self.loader.prepend(PostQueryResult::from(post));
    }

    /// Create a topic in this feed's hub and show it first
    pub async fn create_topic(&self, api: &ApiSession, data: &TopicCreateData) -> Result<Post> {
        let hub = match &self.source {
            FeedSource::Hub(name) => name,
            other => {
                return Err(AppError::Application(format!(
                    "cannot create topics in {:?}",
                    other
                )))
            }
        };

        let post = api.create_topic(hub, data).await?;
        self.prepend(post.clone());
        Ok(post)
    }

    /// Reply to this feed's parent post and show the reply first
    pub async fn reply(&self, api: &ApiSession, data: &CommentCreateData) -> Result<Post> {
        let parent = match &self.source {
            FeedSource::Replies(parent) => parent,
            other => {
                return Err(AppError::Application(format!(
                    "cannot reply in {:?}",
                    other
                )))
            }
        };

        let post = api.create_comment(parent, data).await?;
        self.prepend(post.clone());
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriptions_query() {
        let query = FeedSource::Subscriptions.query(SortMode::Top, 20, Some("p9".to_string()), false);
        assert_eq!(query.hub.as_deref(), Some(SUBSCRIPTIONS_HUB));
        assert_eq!(query.post_type, Some(PostType::Topic));
        assert_eq!(query.after.as_deref(), Some("p9"));
        assert_eq!(query.sort, Some(SortMode::Top));
        assert_eq!(query.limit, Some(20));
    }

    #[test]
    fn test_replies_query() {
        let query = FeedSource::Replies("p1".to_string()).query(SortMode::Hot, 10, None, true);
        assert_eq!(query.parent.as_deref(), Some("p1"));
        assert_eq!(query.post_type, Some(PostType::Comment));
        assert_eq!(query.sort, None);
        assert_eq!(query.nsfw, Some(true));
    }

    #[test]
    fn test_user_query_has_no_type() {
        let query = FeedSource::User("ana".to_string()).query(SortMode::New, 20, None, false);
        assert_eq!(query.owner.as_deref(), Some("ana"));
        assert_eq!(query.post_type, None);
        assert_eq!(query.hub, None);
    }

    #[test]
    fn test_page_size_by_source() {
        let defaults = DefaultsConfig::default();
        assert_eq!(FeedSource::Subscriptions.page_size(&defaults), 20);
        assert_eq!(FeedSource::Replies("p1".to_string()).page_size(&defaults), 10);
    }

    #[test]
    fn test_add_tag_moves_to_end() {
        let mut feed = PostFeed::new(FeedSource::Subscriptions, SortMode::Hot, 20);
        feed.add_tag("rust");
        feed.add_tag("async");
        feed.add_tag("rust");
        assert_eq!(feed.tags(), &["async".to_string(), "rust".to_string()]);

        feed.remove_tag("async");
        assert_eq!(feed.tags(), &["rust".to_string()]);
    }
}
