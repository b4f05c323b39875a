use crate::cache::{QueryKey, keys};

/// A successful write, described by what it touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    CreatePost { author_id: i64 },
    DeletePost { author_id: i64, post_id: i64 },
    CreateComment { post_id: i64 },
    ToggleReaction { post_id: i64 },
    Follow { follower_id: i64, following_id: i64 },
    Unfollow { follower_id: i64, following_id: i64 },
    MarkRead,
}

impl Mutation {
    /// Prefixes of the cached queries the write makes stale.
    pub(crate) fn stale_keys(self) -> Vec<QueryKey> {
        match self {
            Mutation::CreatePost { author_id } => vec![
                keys::posts(),
                keys::paginated_posts(),
                keys::user_posts(author_id),
            ],
            Mutation::DeletePost { author_id, post_id } => vec![
                keys::posts(),
                keys::paginated_posts(),
                keys::post_detail(post_id),
                keys::user_posts(author_id),
            ],
            Mutation::CreateComment { post_id } => vec![
                keys::comments_root(),
                keys::posts(),
                keys::paginated_posts(),
                keys::post_detail(post_id),
                keys::notifications_root(),
                keys::unread_notification_count_root(),
            ],
            Mutation::ToggleReaction { post_id } => reaction_keys(post_id).to_vec(),
            Mutation::Follow {
                follower_id,
                following_id,
            } => {
                let mut stale = follow_keys(follower_id, following_id);
                stale.push(keys::notifications(following_id));
                stale.push(keys::unread_notification_count(following_id));
                stale
            }
            Mutation::Unfollow {
                follower_id,
                following_id,
            } => follow_keys(follower_id, following_id),
            Mutation::MarkRead => vec![
                keys::notifications_root(),
                keys::unread_notification_count_root(),
            ],
        }
    }
}

/// Queries holding a copy of the post's reactions.
pub(crate) fn reaction_keys(post_id: i64) -> [QueryKey; 3] {
    [
        keys::posts(),
        keys::paginated_posts(),
        keys::post_detail(post_id),
    ]
}

fn follow_keys(follower_id: i64, following_id: i64) -> Vec<QueryKey> {
    vec![
        keys::follow_statuses(),
        keys::followed_users(follower_id),
        keys::following_posts(follower_id),
        keys::follower_count(following_id),
        keys::following_count(follower_id),
    ]
}

#[cfg(test)]
mod tests {
    use super::Mutation;
    use crate::cache::{QueryKey, keys};

    fn hits(mutation: Mutation, key: &QueryKey) -> bool {
        mutation
            .stale_keys()
            .iter()
            .any(|prefix| prefix.is_prefix_of(key))
    }

    #[test]
    fn new_post_refreshes_feeds_and_author_posts_only() {
        let created = Mutation::CreatePost { author_id: 3 };

        assert!(hits(created, &keys::posts_with_topics(&["rust".to_string()])));
        assert!(hits(created, &keys::paginated_posts_with_topics(&[])));
        assert!(hits(created, &keys::user_posts(3)));
        assert!(!hits(created, &keys::user_posts(4)));
        assert!(!hits(created, &keys::post_detail(1)));
        assert!(!hits(created, &keys::topics()));
    }

    #[test]
    fn deleted_post_drops_its_detail() {
        let deleted = Mutation::DeletePost {
            author_id: 3,
            post_id: 8,
        };

        assert!(hits(deleted, &keys::post_detail(8)));
        assert!(!hits(deleted, &keys::post_detail(9)));
        assert!(hits(deleted, &keys::user_posts(3)));
    }

    #[test]
    fn comment_refreshes_threads_counts_and_every_inbox() {
        let commented = Mutation::CreateComment { post_id: 5 };

        assert!(hits(commented, &keys::comments(&[5, 6])));
        assert!(hits(commented, &keys::post_detail(5)));
        assert!(hits(commented, &keys::posts()));
        assert!(hits(commented, &keys::notifications(42)));
        assert!(hits(commented, &keys::unread_notification_count(42)));
        assert!(!hits(commented, &keys::post_detail(6)));
        assert!(!hits(commented, &keys::profile("neo")));
    }

    #[test]
    fn follow_notifies_only_the_followed_user() {
        let followed = Mutation::Follow {
            follower_id: 1,
            following_id: 2,
        };

        assert!(hits(followed, &keys::follow_status(1, 2)));
        assert!(hits(followed, &keys::followed_users(1)));
        assert!(hits(followed, &keys::following_posts(1)));
        assert!(hits(followed, &keys::follower_count(2)));
        assert!(hits(followed, &keys::following_count(1)));
        assert!(hits(followed, &keys::notifications(2)));
        assert!(hits(followed, &keys::unread_notification_count(2)));
        assert!(!hits(followed, &keys::notifications(1)));
        assert!(!hits(followed, &keys::follower_count(1)));
    }

    #[test]
    fn unfollow_leaves_inboxes_alone() {
        let unfollowed = Mutation::Unfollow {
            follower_id: 1,
            following_id: 2,
        };

        assert!(hits(unfollowed, &keys::follow_status(1, 2)));
        assert!(hits(unfollowed, &keys::follower_count(2)));
        assert!(!hits(unfollowed, &keys::notifications(2)));
    }

    #[test]
    fn mark_read_refreshes_inbox_and_counter() {
        assert!(hits(Mutation::MarkRead, &keys::notifications(7)));
        assert!(hits(Mutation::MarkRead, &keys::unread_notification_count(7)));
        assert!(!hits(Mutation::MarkRead, &keys::posts()));
    }
}
