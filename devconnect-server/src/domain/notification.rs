use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::error::{DomainError, validate_positive_id};
use super::reaction::ReactionKind;
use super::user::AuthorSummary;

pub(crate) const MAX_LISTED_NOTIFICATIONS: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotificationKind {
    Follow,
    Comment,
    Mention,
    PostReaction,
    NewPost,
}

impl NotificationKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Follow => "follow",
            NotificationKind::Comment => "comment",
            NotificationKind::Mention => "mention",
            NotificationKind::PostReaction => "post_reaction",
            NotificationKind::NewPost => "new_post",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "follow" => Ok(NotificationKind::Follow),
            "comment" => Ok(NotificationKind::Comment),
            "mention" => Ok(NotificationKind::Mention),
            "post_reaction" => Ok(NotificationKind::PostReaction),
            "new_post" => Ok(NotificationKind::NewPost),
            _ => Err(DomainError::Validation {
                field: "kind",
                message: "unknown notification kind",
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Notification {
    pub(crate) id: i64,
    pub(crate) recipient_id: i64,
    pub(crate) kind: NotificationKind,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) is_read: bool,
    pub(crate) related_post_id: Option<i64>,
    pub(crate) related_comment_id: Option<i64>,
    pub(crate) actor: AuthorSummary,
    pub(crate) created_at: DateTime<Utc>,
}

impl Notification {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: i64,
        recipient_id: i64,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        is_read: bool,
        related_post_id: Option<i64>,
        related_comment_id: Option<i64>,
        actor: AuthorSummary,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_positive_id("id", id)?;
        validate_positive_id("recipient_id", recipient_id)?;
        validate_positive_id("actor_id", actor.id)?;
        Ok(Self {
            id,
            recipient_id,
            kind,
            title: title.into(),
            message: message.into(),
            is_read,
            related_post_id,
            related_comment_id,
            actor,
            created_at,
        })
    }
}

/// Who receives a notification. The actor is always excluded from the audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Audience {
    Users(Vec<i64>),
    FollowersOf(i64),
    Usernames(Vec<String>),
}

/// Content shared by every notification produced from a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NotificationTemplate {
    pub(crate) kind: NotificationKind,
    pub(crate) actor_id: i64,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) related_post_id: Option<i64>,
    pub(crate) related_comment_id: Option<i64>,
}

impl NotificationTemplate {
    pub(crate) fn follow(actor: &AuthorSummary) -> Self {
        Self {
            kind: NotificationKind::Follow,
            actor_id: actor.id,
            title: "New follower".to_string(),
            message: format!("{} started following you", display_name(actor)),
            related_post_id: None,
            related_comment_id: None,
        }
    }

    pub(crate) fn comment(actor: &AuthorSummary, post_id: i64, comment_id: i64, is_reply: bool) -> Self {
        let (title, message) = if is_reply {
            ("New reply", format!("{} replied to your comment", display_name(actor)))
        } else {
            ("New comment", format!("{} commented on your post", display_name(actor)))
        };
        Self {
            kind: NotificationKind::Comment,
            actor_id: actor.id,
            title: title.to_string(),
            message,
            related_post_id: Some(post_id),
            related_comment_id: Some(comment_id),
        }
    }

    pub(crate) fn mention(actor: &AuthorSummary, post_id: i64, comment_id: Option<i64>) -> Self {
        Self {
            kind: NotificationKind::Mention,
            actor_id: actor.id,
            title: "You were mentioned".to_string(),
            message: format!("{} mentioned you", display_name(actor)),
            related_post_id: Some(post_id),
            related_comment_id: comment_id,
        }
    }

    pub(crate) fn post_reaction(actor: &AuthorSummary, post_id: i64, kind: ReactionKind) -> Self {
        Self {
            kind: NotificationKind::PostReaction,
            actor_id: actor.id,
            title: "New reaction".to_string(),
            message: format!("{} reacted {} to your post", display_name(actor), kind),
            related_post_id: Some(post_id),
            related_comment_id: None,
        }
    }

    pub(crate) fn new_post(actor: &AuthorSummary, post_id: i64) -> Self {
        Self {
            kind: NotificationKind::NewPost,
            actor_id: actor.id,
            title: "New post".to_string(),
            message: format!("{} published a new post", display_name(actor)),
            related_post_id: Some(post_id),
            related_comment_id: None,
        }
    }
}

fn display_name(actor: &AuthorSummary) -> String {
    match (&actor.username, &actor.full_name) {
        (Some(username), _) => format!("@{username}"),
        (None, Some(full_name)) => full_name.clone(),
        (None, None) => "Someone".to_string(),
    }
}

/// Collects `@username` handles in order of first appearance, lowercased.
/// Usernames are matched against them without regard to case.
///
/// A handle must start the text or follow a character that cannot be part of
/// a handle, so e-mail addresses do not count as mentions.
pub(crate) fn extract_mentions(text: &str) -> Vec<String> {
    let is_handle_char = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.');

    let mut mentions: Vec<String> = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut idx = 0;
    while idx < chars.len() {
        let preceded_by_handle = idx > 0 && is_handle_char(chars[idx - 1]);
        if chars[idx] != '@' || preceded_by_handle {
            idx += 1;
            continue;
        }

        let start = idx + 1;
        let mut end = start;
        while end < chars.len() && is_handle_char(chars[end]) {
            end += 1;
        }
        let handle: String = chars[start..end].iter().collect();
        let handle = handle.trim_end_matches(['.', '-']).to_ascii_lowercase();
        if (3..=64).contains(&handle.len()) && !mentions.contains(&handle) {
            mentions.push(handle);
        }
        idx = end.max(start);
    }
    mentions
}
