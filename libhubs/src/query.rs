//! Query options for list endpoints
//!
//! Every list endpoint accepts `limit`, `page` or an `after` cursor plus its
//! own filters. Encoding rules match what the service expects: numbers are
//! always sent, strings only when non-empty, booleans only when true, and
//! unset fields never.

use crate::types::SortMode;

/// Ordered list of query-string pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(&mut self, key: &'static str, value: Option<u32>) -> &mut Self {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    pub fn text(&mut self, key: &'static str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.pairs.push((key, value.to_string()));
        }
        self
    }

    pub fn flag(&mut self, key: &'static str, value: Option<bool>) -> &mut Self {
        if value == Some(true) {
            self.pairs.push((key, "true".to_string()));
        }
        self
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Anything that can be turned into query-string pairs
pub trait ToQuery {
    fn to_query(&self) -> QueryParams;
}

/// Post discriminant used as a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostType {
    Topic,
    Comment,
}

impl PostType {
    pub fn as_str(self) -> &'static str {
        match self {
            PostType::Topic => "Topic",
            PostType::Comment => "Comment",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub after: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
}

impl ToQuery for UserQuery {
    fn to_query(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params
            .number("limit", self.limit)
            .number("page", self.page)
            .text("after", self.after.as_deref())
            .text("name", self.name.as_deref())
            .text("username", self.username.as_deref());
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub after: Option<String>,
    pub name: Option<String>,
    pub owner: Option<String>,
}

impl ToQuery for HubQuery {
    fn to_query(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params
            .number("limit", self.limit)
            .number("page", self.page)
            .text("after", self.after.as_deref())
            .text("name", self.name.as_deref())
            .text("owner", self.owner.as_deref());
        params
    }
}

/// Hub name the service understands as "every hub I am subscribed to"
pub const SUBSCRIPTIONS_HUB: &str = "_subscriptions";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub after: Option<String>,
    pub post_type: Option<PostType>,
    pub title: Option<String>,
    pub hub: Option<String>,
    pub parent: Option<String>,
    pub owner: Option<String>,
    pub sort: Option<SortMode>,
    /// Include explicit posts in the result
    pub nsfw: Option<bool>,
}

impl ToQuery for PostQuery {
    fn to_query(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params
            .number("limit", self.limit)
            .number("page", self.page)
            .text("after", self.after.as_deref())
            .text("type", self.post_type.map(PostType::as_str))
            .text("title", self.title.as_deref())
            .text("hub", self.hub.as_deref())
            .text("parent", self.parent.as_deref())
            .text("owner", self.owner.as_deref())
            .text("sort", self.sort.map(SortMode::as_str))
            .flag("nsfw", self.nsfw);
        params
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeratorQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub after: Option<String>,
    pub hub: Option<String>,
    pub username: Option<String>,
}

impl ToQuery for ModeratorQuery {
    fn to_query(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params
            .number("limit", self.limit)
            .number("page", self.page)
            .text("after", self.after.as_deref())
            .text("hub", self.hub.as_deref())
            .text("username", self.username.as_deref());
        params
    }
}
