use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account of the signed-in user, as returned by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: i64,
    /// Username; absent right after an OAuth sign-up.
    pub username: Option<String>,
    /// Display name.
    pub full_name: Option<String>,
    /// E-mail address.
    pub email: String,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// `password`, `github` or `google`.
    pub provider: String,
    /// Whether the user has picked a username.
    pub username_set: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// OAuth accounts must choose a username before they can post.
    pub fn is_missing_username(&self) -> bool {
        !self.username_set || self.username.as_deref().is_none_or(str::is_empty)
    }
}

/// Access token plus the account it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// JWT for the `Authorization: Bearer` header.
    pub access_token: String,
    /// Signed-in user.
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AuthorizeUrl {
    pub(crate) authorize_url: String,
}

/// Public profile of any user. Never carries the e-mail address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// User id.
    pub id: i64,
    /// Username.
    pub username: Option<String>,
    /// Display name.
    pub full_name: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Short author summary embedded in posts, comments and follow lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// User id.
    pub id: i64,
    /// Username.
    pub username: Option<String>,
    /// Display name.
    pub full_name: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
}

/// Reaction a user can leave on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    /// 😊
    Happy,
    /// 😢
    Sad,
}

impl ReactionKind {
    /// Wire name of the reaction.
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Happy => "happy",
            ReactionKind::Sad => "sad",
        }
    }
}

impl std::str::FromStr for ReactionKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "happy" => Ok(ReactionKind::Happy),
            "sad" => Ok(ReactionKind::Sad),
            other => Err(format!("unknown reaction '{other}', expected happy or sad")),
        }
    }
}

/// Ids of users who reacted to a post, per reaction kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reactions {
    /// Users with a happy reaction.
    pub happy: Vec<i64>,
    /// Users with a sad reaction.
    pub sad: Vec<i64>,
}

impl Reactions {
    fn list_mut(&mut self, kind: ReactionKind) -> &mut Vec<i64> {
        match kind {
            ReactionKind::Happy => &mut self.happy,
            ReactionKind::Sad => &mut self.sad,
        }
    }

    /// Applies the server's toggle rule locally: the same kind again removes
    /// the reaction, another kind replaces it, otherwise it is added.
    pub fn toggle(&mut self, user_id: i64, kind: ReactionKind) {
        let had_same = self.list_mut(kind).contains(&user_id);
        self.happy.retain(|id| *id != user_id);
        self.sad.retain(|id| *id != user_id);
        if !had_same {
            self.list_mut(kind).push(user_id);
        }
    }

    /// Reaction the user currently has, if any.
    pub fn of(&self, user_id: i64) -> Option<ReactionKind> {
        if self.happy.contains(&user_id) {
            Some(ReactionKind::Happy)
        } else if self.sad.contains(&user_id) {
            Some(ReactionKind::Sad)
        } else {
            None
        }
    }
}

/// Feed item: a post with its author, topics, comment count and reactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Post id.
    pub id: i64,
    /// Text, at most 280 characters.
    pub content: String,
    /// Attached image.
    pub image_url: Option<String>,
    /// Author summary.
    pub author: Author,
    /// Topic ids.
    pub topics: Vec<String>,
    /// Number of comments, replies included.
    pub comments_count: i64,
    /// Reactions by kind.
    pub reactions: Reactions,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One page of the global feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    /// Posts, newest first.
    pub posts: Vec<Post>,
    /// Requested page size.
    pub limit: u32,
    /// Requested offset.
    pub offset: u32,
    /// Number of posts matching the filter.
    pub total: i64,
}

/// Topic from the fixed catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Topic id, used in filters and on posts.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Flat comment as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment id.
    pub id: i64,
    /// Post the comment belongs to.
    pub post_id: i64,
    /// Parent comment for replies.
    pub parent_id: Option<i64>,
    /// Author summary.
    pub author: Author,
    /// Text, at most 200 characters.
    pub content: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Comment together with its nested replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    /// The comment itself.
    pub comment: Comment,
    /// Direct replies, oldest first.
    pub replies: Vec<CommentNode>,
}

/// Builds the reply tree of a flat comment list. Comments whose parent is
/// missing from the list are dropped. Siblings keep their input order.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let known: std::collections::HashSet<i64> = comments.iter().map(|c| c.id).collect();
    let mut children: HashMap<Option<i64>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        match comment.parent_id {
            Some(parent) if !known.contains(&parent) => continue,
            parent => children.entry(parent).or_default().push(comment),
        }
    }

    fn attach(
        parent: Option<i64>,
        children: &mut HashMap<Option<i64>, Vec<Comment>>,
    ) -> Vec<CommentNode> {
        let Some(level) = children.remove(&parent) else {
            return Vec::new();
        };
        level
            .into_iter()
            .map(|comment| {
                let replies = attach(Some(comment.id), children);
                CommentNode { comment, replies }
            })
            .collect()
    }

    attach(None, &mut children)
}

/// Follow edge between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    /// Edge id.
    pub id: i64,
    /// Who follows.
    pub follower_id: i64,
    /// Who is followed.
    pub following_id: i64,
    /// When the follow happened.
    pub created_at: DateTime<Utc>,
}

/// Follower and following counters of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    /// Users following this user.
    pub followers: i64,
    /// Users this user follows.
    pub following: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct FollowStatus {
    pub(crate) following: bool,
}

/// Inbox entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id.
    pub id: i64,
    /// `follow`, `comment`, `mention`, `post_reaction` or `new_post`.
    pub kind: String,
    /// Short headline.
    pub title: String,
    /// Human readable text.
    pub message: String,
    /// Read flag.
    pub is_read: bool,
    /// Post the notification points to.
    pub related_post_id: Option<i64>,
    /// Comment the notification points to.
    pub related_comment_id: Option<i64>,
    /// User who caused the notification.
    pub actor: Author,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UnreadCount {
    pub(crate) unread: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MarkedRead {
    pub(crate) updated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct UploadedImage {
    pub(crate) url: String,
}
