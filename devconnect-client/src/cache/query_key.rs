use std::fmt;

/// Ordered list of string segments identifying a cached query.
///
/// Invalidation works on prefixes: `["notifications"]` matches
/// `["notifications", "7"]`, while `["notification"]` matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Builds a key from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Segments of the key.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether `self` is a segment-wise prefix of `other` (or equal to it).
    pub fn is_prefix_of(&self, other: &QueryKey) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Keys of every query the client caches.
pub mod keys {
    use super::QueryKey;

    /// Root of the plain feed and its topic-filtered variants.
    pub fn posts() -> QueryKey {
        QueryKey::new(["posts"])
    }

    /// Feed filtered by topics (sorted, so the order of the filter does not matter).
    /// No topics is the plain feed.
    pub fn posts_with_topics(topics: &[String]) -> QueryKey {
        with_topics("posts", topics)
    }

    /// Root of the infinite feed.
    pub fn paginated_posts() -> QueryKey {
        QueryKey::new(["paginatedPosts"])
    }

    /// Infinite feed for a topic filter.
    pub fn paginated_posts_with_topics(topics: &[String]) -> QueryKey {
        with_topics("paginatedPosts", topics)
    }

    fn with_topics(root: &str, topics: &[String]) -> QueryKey {
        if topics.is_empty() {
            return QueryKey::new([root]);
        }
        let mut topics = topics.to_vec();
        topics.sort();
        topics.dedup();
        QueryKey::new([root.to_string(), topics.join(",")])
    }

    /// Root of single post entries.
    pub fn post_details() -> QueryKey {
        QueryKey::new(["postDetail"])
    }

    /// Single post.
    pub fn post_detail(post_id: i64) -> QueryKey {
        QueryKey::new(["postDetail".to_string(), post_id.to_string()])
    }

    /// Root of comment lists.
    pub fn comments_root() -> QueryKey {
        QueryKey::new(["comments"])
    }

    /// Comments of a set of posts. Ids are sorted so equal sets share an entry.
    pub fn comments(post_ids: &[i64]) -> QueryKey {
        let mut ids = post_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let ids = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        QueryKey::new(["comments".to_string(), ids])
    }

    /// Public profile by username.
    pub fn profile(username: &str) -> QueryKey {
        QueryKey::new(["profile", username])
    }

    /// Posts of one author.
    pub fn user_posts(user_id: i64) -> QueryKey {
        QueryKey::new(["userPosts".to_string(), user_id.to_string()])
    }

    /// Root of follow status entries.
    pub fn follow_statuses() -> QueryKey {
        QueryKey::new(["followStatus"])
    }

    /// Whether `follower_id` follows `following_id`.
    pub fn follow_status(follower_id: i64, following_id: i64) -> QueryKey {
        QueryKey::new([
            "followStatus".to_string(),
            follower_id.to_string(),
            following_id.to_string(),
        ])
    }

    /// Users followed by `user_id`.
    pub fn followed_users(user_id: i64) -> QueryKey {
        QueryKey::new(["followedUsers".to_string(), user_id.to_string()])
    }

    /// Feed of users followed by `user_id`.
    pub fn following_posts(user_id: i64) -> QueryKey {
        QueryKey::new(["followingPosts".to_string(), user_id.to_string()])
    }

    /// Follower count of `user_id`.
    pub fn follower_count(user_id: i64) -> QueryKey {
        QueryKey::new(["followerCount".to_string(), user_id.to_string()])
    }

    /// Following count of `user_id`.
    pub fn following_count(user_id: i64) -> QueryKey {
        QueryKey::new(["followingCount".to_string(), user_id.to_string()])
    }

    /// Inbox of `user_id`.
    pub fn notifications(user_id: i64) -> QueryKey {
        QueryKey::new(["notifications".to_string(), user_id.to_string()])
    }

    /// Root of all inboxes.
    pub fn notifications_root() -> QueryKey {
        QueryKey::new(["notifications"])
    }

    /// Unread counter of `user_id`.
    pub fn unread_notification_count(user_id: i64) -> QueryKey {
        QueryKey::new(["unreadNotificationCount".to_string(), user_id.to_string()])
    }

    /// Root of all unread counters.
    pub fn unread_notification_count_root() -> QueryKey {
        QueryKey::new(["unreadNotificationCount"])
    }

    /// Topic catalog.
    pub fn topics() -> QueryKey {
        QueryKey::new(["topics"])
    }
}

#[cfg(test)]
mod tests {
    use super::{QueryKey, keys};

    #[test]
    fn prefix_matching_is_segment_wise() {
        let root = keys::notifications_root();
        assert!(root.is_prefix_of(&keys::notifications(7)));
        assert!(root.is_prefix_of(&root));
        assert!(!QueryKey::new(["notification"]).is_prefix_of(&keys::notifications(7)));
        assert!(!keys::notifications(7).is_prefix_of(&root));
    }

    #[test]
    fn post_detail_root_does_not_match_feed() {
        assert!(!keys::post_details().is_prefix_of(&keys::posts()));
        assert!(keys::post_details().is_prefix_of(&keys::post_detail(3)));
    }

    #[test]
    fn comment_keys_ignore_id_order() {
        assert_eq!(keys::comments(&[3, 1, 2, 3]), keys::comments(&[1, 2, 3]));
        assert!(keys::comments_root().is_prefix_of(&keys::comments(&[1])));
    }

    #[test]
    fn topic_filtered_feed_lives_under_posts() {
        let filtered = keys::posts_with_topics(&["rust".to_string(), "ai".to_string()]);
        assert_eq!(filtered.segments(), ["posts", "ai,rust"]);
        assert!(keys::posts().is_prefix_of(&filtered));
        assert_eq!(keys::posts_with_topics(&[]), keys::posts());
    }

    #[test]
    fn display_joins_segments() {
        assert_eq!(keys::follow_status(1, 2).to_string(), "[followStatus, 1, 2]");
    }
}
