use std::sync::Arc;

use tracing::info;

use crate::application::notification_service::NotificationService;
use crate::data::comment_repository::{CommentRepository, NewComment};
use crate::data::notification_repository::NotificationRepository;
use crate::data::post_repository::PostRepository;
use crate::domain::comment::{Comment, CreateCommentRequest};
use crate::domain::error::{DomainError, validate_positive_id};
use crate::domain::notification::{Audience, NotificationTemplate, extract_mentions};

/// Upper bound on post ids accepted by a single comments lookup.
pub(crate) const MAX_POSTS_PER_LOOKUP: usize = 100;

pub(crate) struct CommentService<C, P, N>
where
    C: CommentRepository,
    P: PostRepository,
    N: NotificationRepository,
{
    comments: C,
    posts: P,
    notifications: Arc<NotificationService<N>>,
}

impl<C, P, N> CommentService<C, P, N>
where
    C: CommentRepository,
    P: PostRepository,
    N: NotificationRepository,
{
    pub(crate) fn new(comments: C, posts: P, notifications: Arc<NotificationService<N>>) -> Self {
        Self {
            comments,
            posts,
            notifications,
        }
    }

    /// Flat list of comments on the given posts, oldest first.
    pub(crate) async fn comments_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<Vec<Comment>, DomainError> {
        let mut ids: Vec<i64> = Vec::with_capacity(post_ids.len());
        for id in post_ids {
            validate_positive_id("post_ids", *id)?;
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        if ids.len() > MAX_POSTS_PER_LOOKUP {
            return Err(DomainError::Validation {
                field: "post_ids",
                message: "too many posts in one request",
            });
        }
        self.comments.list_for_posts(&ids).await
    }

    pub(crate) async fn create_comment(
        &self,
        author_id: i64,
        post_id: i64,
        req: CreateCommentRequest,
    ) -> Result<Comment, DomainError> {
        validate_positive_id("author_id", author_id)?;
        validate_positive_id("post_id", post_id)?;
        let req = req.validate()?;

        let post = self
            .posts
            .get_ownership(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post {post_id}")))?;

        let parent = match req.parent_id {
            Some(parent_id) => {
                let parent = self
                    .comments
                    .find_parent(parent_id)
                    .await?
                    .ok_or_else(|| DomainError::NotFound(format!("comment {parent_id}")))?;
                parent.accepts_reply_on(post_id)?;
                Some(parent)
            }
            None => None,
        };

        let mentions = extract_mentions(&req.content);
        let comment = self
            .comments
            .create_comment(NewComment {
                post_id,
                author_id,
                parent_id: req.parent_id,
                content: req.content,
            })
            .await?;
        info!(comment_id = comment.id, post_id, "comment created");

        // Each recipient hears about the comment once; the reply wording wins.
        let mut notified = vec![author_id];
        if let Some(parent) = parent
            && !notified.contains(&parent.author_id)
        {
            self.notifications
                .dispatch_or_log(
                    Audience::Users(vec![parent.author_id]),
                    NotificationTemplate::comment(&comment.author, post_id, comment.id, true),
                )
                .await;
            notified.push(parent.author_id);
        }
        if !notified.contains(&post.author_id) {
            self.notifications
                .dispatch_or_log(
                    Audience::Users(vec![post.author_id]),
                    NotificationTemplate::comment(&comment.author, post_id, comment.id, false),
                )
                .await;
        }
        if !mentions.is_empty() {
            self.notifications
                .dispatch_or_log(
                    Audience::Usernames(mentions),
                    NotificationTemplate::mention(&comment.author, post_id, Some(comment.id)),
                )
                .await;
        }

        Ok(comment)
    }
}
