use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::application::media_service::MediaService;
use crate::application::notification_service::NotificationService;
use crate::data::notification_repository::NotificationRepository;
use crate::data::post_repository::{NewPost, Pagination, PostRepository};
use crate::domain::error::{DomainError, validate_positive_id};
use crate::domain::notification::{Audience, NotificationTemplate, extract_mentions};
use crate::domain::post::{CreatePostRequest, PostDetails};
use crate::domain::topic::{AVAILABLE_TOPICS, Topic, normalize_topics};
use crate::infrastructure::object_storage::ObjectStorage;

pub(crate) const DEFAULT_FEED_LIMIT: u32 = 20;
pub(crate) const MAX_FEED_LIMIT: u32 = 100;

#[derive(Debug, Clone)]
pub(crate) struct FeedPage {
    pub(crate) posts: Vec<PostDetails>,
    pub(crate) limit: u32,
    pub(crate) offset: u32,
    pub(crate) total: i64,
}

pub(crate) struct PostService<P, N, S>
where
    P: PostRepository,
    N: NotificationRepository,
    S: ObjectStorage,
{
    repo: P,
    notifications: Arc<NotificationService<N>>,
    media: Arc<MediaService<S>>,
}

impl<P, N, S> PostService<P, N, S>
where
    P: PostRepository,
    N: NotificationRepository,
    S: ObjectStorage,
{
    pub(crate) fn new(
        repo: P,
        notifications: Arc<NotificationService<N>>,
        media: Arc<MediaService<S>>,
    ) -> Self {
        Self {
            repo,
            notifications,
            media,
        }
    }

    #[instrument(skip(self, req))]
    pub(crate) async fn create_post(
        &self,
        author_id: i64,
        req: CreatePostRequest,
    ) -> Result<PostDetails, DomainError> {
        validate_positive_id("author_id", author_id)?;
        let req = req.validate()?;
        let mentions = extract_mentions(&req.content);

        let post = self
            .repo
            .create_post(NewPost {
                author_id,
                content: req.content,
                image_url: req.image_url,
                topics: req.topics,
            })
            .await?;
        info!(post_id = post.id, "post created");

        self.notifications
            .dispatch_or_log(
                Audience::FollowersOf(author_id),
                NotificationTemplate::new_post(&post.author, post.id),
            )
            .await;
        if !mentions.is_empty() {
            self.notifications
                .dispatch_or_log(
                    Audience::Usernames(mentions),
                    NotificationTemplate::mention(&post.author, post.id, None),
                )
                .await;
        }

        Ok(post)
    }

    /// Newest posts first; `topics` keeps posts tagged with any of them.
    pub(crate) async fn feed(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
        topics: Option<Vec<String>>,
    ) -> Result<FeedPage, DomainError> {
        let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT);
        if !(1..=MAX_FEED_LIMIT).contains(&limit) {
            return Err(DomainError::Validation {
                field: "limit",
                message: "must be in 1..=100",
            });
        }
        let offset = offset.unwrap_or(0);
        let topics = match topics {
            Some(topics) if !topics.is_empty() => Some(normalize_topics(&topics)?),
            _ => None,
        };

        let posts = self
            .repo
            .list_feed(Pagination { limit, offset }, topics.clone())
            .await?;
        let total = self.repo.total_posts(topics).await?;

        Ok(FeedPage {
            posts,
            limit,
            offset,
            total,
        })
    }

    pub(crate) async fn post_details(&self, post_id: i64) -> Result<PostDetails, DomainError> {
        validate_positive_id("post_id", post_id)?;
        self.repo
            .get_post_details(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post {post_id}")))
    }

    pub(crate) async fn user_posts(&self, user_id: i64) -> Result<Vec<PostDetails>, DomainError> {
        validate_positive_id("user_id", user_id)?;
        self.repo.list_by_author(user_id).await
    }

    pub(crate) async fn following_feed(
        &self,
        user_id: i64,
    ) -> Result<Vec<PostDetails>, DomainError> {
        validate_positive_id("user_id", user_id)?;
        self.repo.list_following(user_id).await
    }

    #[instrument(skip(self))]
    pub(crate) async fn delete_post(&self, actor_id: i64, post_id: i64) -> Result<(), DomainError> {
        validate_positive_id("post_id", post_id)?;
        let ownership = self
            .repo
            .get_ownership(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post {post_id}")))?;
        if ownership.author_id != actor_id {
            return Err(DomainError::Forbidden);
        }

        if !self.repo.delete_post(post_id).await? {
            return Err(DomainError::NotFound(format!("post {post_id}")));
        }
        info!(post_id, "post deleted");

        if let Some(image_url) = ownership.image_url
            && let Err(err) = self.media.delete_image(actor_id, &image_url).await
        {
            warn!(post_id, error = %err, "post image was not removed");
        }
        Ok(())
    }

    pub(crate) fn topics(&self) -> &'static [Topic] {
        AVAILABLE_TOPICS
    }
}
