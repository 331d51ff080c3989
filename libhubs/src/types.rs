//! Core types for Hubs
//!
//! These mirror the JSON the forum service exchanges (camelCase field names,
//! `postType` discriminant on posts).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content type of a markdown post body
pub const MARKDOWN_CONTENT_TYPE: u8 = 0;

/// Content type of a post whose body is an image URL
pub const IMAGE_CONTENT_TYPE: u8 = 1;

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A signed-in user together with the bearer token of the session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserToken {
    pub user: User,
    pub token: String,
}

/// Credentials for signing in
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogInData {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LogInData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogInData")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Account creation payload
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignUpData {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
}

impl fmt::Debug for SignUpData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUpData")
            .field("username", &self.username)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// ============================================================================
// Hubs
// ============================================================================

/// Fields supplied when creating a hub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubBase {
    pub name: String,
    pub description: String,
    pub image_url: String,
    #[serde(rename = "isNSFW")]
    pub is_nsfw: bool,
    pub banner_color: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hub {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
    pub name: String,
    pub description: String,
    pub image_url: String,
    #[serde(rename = "isNSFW")]
    pub is_nsfw: bool,
    pub banner_color: u32,
    #[serde(default)]
    pub subscribers_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_color: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub hub_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<Hub>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// What a moderator (or the caller, on a hub query) may do in a hub
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_edit: bool,
    pub can_delete_posts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Moderator {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub hub_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<Hub>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub can_edit: bool,
    pub can_delete_posts: bool,
}

impl Moderator {
    pub fn permissions(&self) -> Permissions {
        Permissions {
            can_edit: self.can_edit,
            can_delete_posts: self.can_delete_posts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeratorCreateData {
    pub hub: String,
    pub username: String,
    pub permissions: Permissions,
}

/// Result of fetching a single hub: the hub plus the caller's relation to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubQueryResult {
    pub subscribed: bool,
    pub permissions: Permissions,
    pub hub: Hub,
}

// ============================================================================
// Posts
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
    pub hub_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<Hub>,
    pub content: String,
    pub content_type: u8,
    #[serde(rename = "isNSFW")]
    pub is_nsfw: bool,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub dislikes: i64,
    #[serde(default)]
    pub comments_count: u64,
    pub title: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub locked: i64,
}

impl Topic {
    /// Tags are stored space-separated
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags.split(' ').filter(|tag| !tag.is_empty()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
    pub hub_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<Hub>,
    pub content: String,
    pub content_type: u8,
    #[serde(rename = "isNSFW")]
    pub is_nsfw: bool,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub dislikes: i64,
    #[serde(default)]
    pub comments_count: u64,
    pub parent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Post>>,
}

/// A topic or a comment, discriminated by `postType`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "postType")]
pub enum Post {
    Topic(Topic),
    Comment(Comment),
}

impl Post {
    pub fn id(&self) -> &str {
        match self {
            Post::Topic(topic) => &topic.id,
            Post::Comment(comment) => &comment.id,
        }
    }

    pub fn hub_id(&self) -> &str {
        match self {
            Post::Topic(topic) => &topic.hub_id,
            Post::Comment(comment) => &comment.hub_id,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            Post::Topic(topic) => &topic.owner_id,
            Post::Comment(comment) => &comment.owner_id,
        }
    }

    pub fn is_nsfw(&self) -> bool {
        match self {
            Post::Topic(topic) => topic.is_nsfw,
            Post::Comment(comment) => comment.is_nsfw,
        }
    }

    pub fn as_topic(&self) -> Option<&Topic> {
        match self {
            Post::Topic(topic) => Some(topic),
            Post::Comment(_) => None,
        }
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            Post::Topic(_) => None,
            Post::Comment(comment) => Some(comment),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopicCreateData {
    pub title: String,
    pub tags: String,
    pub content: String,
    pub content_type: u8,
    #[serde(rename = "isNSFW")]
    pub is_nsfw: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreateData {
    pub content: String,
    pub content_type: u8,
    #[serde(rename = "isNSFW")]
    pub is_nsfw: bool,
}

/// A post together with the caller's reaction to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostQueryResult {
    #[serde(default, with = "reaction_code")]
    pub reaction: Option<Reaction>,
    pub post: Post,
}

impl From<Post> for PostQueryResult {
    fn from(post: Post) -> Self {
        Self {
            reaction: None,
            post,
        }
    }
}

// ============================================================================
// Reactions
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    /// Numeric code used by the service (1 = like, 2 = dislike)
    pub fn code(self) -> u8 {
        match self {
            Reaction::Like => 1,
            Reaction::Dislike => 2,
        }
    }

    /// Decode the service's numeric code; anything else is "no reaction"
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Reaction::Like),
            2 => Some(Reaction::Dislike),
            _ => None,
        }
    }
}

/// What to do with the caller's reaction on a post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionChoice {
    Like,
    Dislike,
    Clear,
}

impl ReactionChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionChoice::Like => "like",
            ReactionChoice::Dislike => "dislike",
            ReactionChoice::Clear => "clear",
        }
    }
}

impl From<Option<Reaction>> for ReactionChoice {
    fn from(reaction: Option<Reaction>) -> Self {
        match reaction {
            Some(Reaction::Like) => ReactionChoice::Like,
            Some(Reaction::Dislike) => ReactionChoice::Dislike,
            None => ReactionChoice::Clear,
        }
    }
}

mod reaction_code {
    use super::Reaction;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        reaction: &Option<Reaction>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match reaction {
            Some(reaction) => serializer.serialize_u8(reaction.code()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Reaction>, D::Error> {
        let code = Option::<i64>::deserialize(deserializer)?;
        Ok(code.and_then(Reaction::from_code))
    }
}

// ============================================================================
// Preferences
// ============================================================================

/// Feed ordering
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    New,
    #[default]
    Hot,
    Top,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::New => "new",
            SortMode::Hot => "hot",
            SortMode::Top => "top",
        }
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(SortMode::New),
            "hot" => Ok(SortMode::Hot),
            "top" => Ok(SortMode::Top),
            _ => Err(format!("Invalid sort mode: '{}'. Valid options: new, hot, top", s)),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feed rendering density
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Minimal,
    Image,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Minimal => "minimal",
            ViewMode::Image => "image",
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(ViewMode::Minimal),
            "image" => Ok(ViewMode::Image),
            _ => Err(format!("Invalid view mode: '{}'. Valid options: minimal, image", s)),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Uploads
// ============================================================================

/// Signed locations returned by the image upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUploadTarget {
    /// Where to PUT the bytes
    pub put: String,
    /// Where the image can be read afterwards
    pub get: String,
}

// ============================================================================
// Cursors
// ============================================================================

/// Items that can seed an `after` cursor for the next page
pub trait Cursor {
    fn cursor(&self) -> &str;
}

impl Cursor for PostQueryResult {
    fn cursor(&self) -> &str {
        self.post.id()
    }
}

impl Cursor for Post {
    fn cursor(&self) -> &str {
        self.id()
    }
}

impl Cursor for Hub {
    fn cursor(&self) -> &str {
        &self.id
    }
}

impl Cursor for User {
    fn cursor(&self) -> &str {
        &self.id
    }
}

impl Cursor for Moderator {
    fn cursor(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topic_json() -> serde_json::Value {
        json!({
            "postType": "Topic",
            "id": "t1",
            "createdAt": "2021-03-01T12:00:00Z",
            "lastModified": "2021-03-01T12:00:00Z",
            "ownerId": "u1",
            "hubId": "h1",
            "content": "hello",
            "contentType": 0,
            "isNSFW": false,
            "likes": 3,
            "dislikes": 1,
            "commentsCount": 2,
            "title": "First",
            "tags": "rust  async",
            "stickied": true,
            "locked": 0
        })
    }

    #[test]
    fn test_post_discriminant_topic() {
        let post: Post = serde_json::from_value(topic_json()).unwrap();
        let topic = post.as_topic().unwrap();
        assert_eq!(topic.title, "First");
        assert_eq!(post.id(), "t1");
        assert_eq!(topic.tag_list(), vec!["rust", "async"]);
    }

    #[test]
    fn test_post_discriminant_comment_with_parent() {
        let value = json!({
            "postType": "Comment",
            "id": "c1",
            "createdAt": "2021-03-01T12:00:00Z",
            "lastModified": "2021-03-01T12:00:00Z",
            "ownerId": "u2",
            "hubId": "h1",
            "content": "reply",
            "contentType": 0,
            "isNSFW": true,
            "parentId": "t1",
            "parent": topic_json()
        });

        let post: Post = serde_json::from_value(value).unwrap();
        let comment = post.as_comment().unwrap();
        assert_eq!(comment.parent_id, "t1");
        assert!(post.is_nsfw());
        assert_eq!(comment.parent.as_ref().unwrap().id(), "t1");
        assert_eq!(comment.likes, 0);
    }

    #[test]
    fn test_reaction_codes_decode() {
        let liked: PostQueryResult =
            serde_json::from_value(json!({ "reaction": 1, "post": topic_json() })).unwrap();
        assert_eq!(liked.reaction, Some(Reaction::Like));

        let disliked: PostQueryResult =
            serde_json::from_value(json!({ "reaction": 2, "post": topic_json() })).unwrap();
        assert_eq!(disliked.reaction, Some(Reaction::Dislike));

        let none: PostQueryResult =
            serde_json::from_value(json!({ "reaction": 0, "post": topic_json() })).unwrap();
        assert_eq!(none.reaction, None);

        let missing: PostQueryResult =
            serde_json::from_value(json!({ "post": topic_json() })).unwrap();
        assert_eq!(missing.reaction, None);
        assert_eq!(missing.cursor(), "t1");
    }

    #[test]
    fn test_hub_base_uses_nsfw_casing() {
        let hub = HubBase {
            name: "rust".to_string(),
            description: "Rust talk".to_string(),
            image_url: String::new(),
            is_nsfw: false,
            banner_color: 0xff0000,
        };
        let value = serde_json::to_value(&hub).unwrap();
        assert_eq!(value["isNSFW"], json!(false));
        assert_eq!(value["bannerColor"], json!(0xff0000));
        assert_eq!(value["imageUrl"], json!(""));
    }

    #[test]
    fn test_patches_omit_unset_fields() {
        let patch = UserPatch {
            status: Some("away".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({ "status": "away" }));
    }

    #[test]
    fn test_sort_and_view_parse() {
        assert_eq!("top".parse::<SortMode>().unwrap(), SortMode::Top);
        assert!("best".parse::<SortMode>().is_err());
        assert_eq!("image".parse::<ViewMode>().unwrap(), ViewMode::Image);
        assert!("grid".parse::<ViewMode>().is_err());
        assert_eq!(SortMode::default(), SortMode::Hot);
        assert_eq!(ViewMode::default(), ViewMode::Minimal);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let data = LogInData {
            username: "ana".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", data);
        assert!(debug.contains("ana"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_reaction_choice_from_reaction() {
        assert_eq!(ReactionChoice::from(Some(Reaction::Like)).as_str(), "like");
        assert_eq!(ReactionChoice::from(None).as_str(), "clear");
    }
}
