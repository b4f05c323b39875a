use std::sync::Arc;

use tracing::info;

use crate::application::notification_service::NotificationService;
use crate::data::follow_repository::FollowRepository;
use crate::data::notification_repository::NotificationRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::error::{DomainError, validate_positive_id};
use crate::domain::follow::{Follow, FollowCounts, validate_follow_pair};
use crate::domain::notification::{Audience, NotificationTemplate};
use crate::domain::user::AuthorSummary;

pub(crate) struct FollowService<F, U, N>
where
    F: FollowRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    follows: F,
    users: U,
    notifications: Arc<NotificationService<N>>,
}

impl<F, U, N> FollowService<F, U, N>
where
    F: FollowRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    pub(crate) fn new(follows: F, users: U, notifications: Arc<NotificationService<N>>) -> Self {
        Self {
            follows,
            users,
            notifications,
        }
    }

    pub(crate) async fn follow(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<Follow, DomainError> {
        validate_follow_pair(follower_id, following_id)?;
        let follower = self
            .users
            .find_by_id(follower_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user {follower_id}")))?;
        if self.users.find_by_id(following_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("user {following_id}")));
        }

        let follow = self.follows.create_follow(follower_id, following_id).await?;
        info!(follower_id, following_id, "follow created");

        self.notifications
            .dispatch_or_log(
                Audience::Users(vec![following_id]),
                NotificationTemplate::follow(&follower.summary()),
            )
            .await;
        Ok(follow)
    }

    pub(crate) async fn unfollow(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<(), DomainError> {
        validate_positive_id("follower_id", follower_id)?;
        validate_positive_id("following_id", following_id)?;
        if !self.follows.delete_follow(follower_id, following_id).await? {
            return Err(DomainError::NotFound("follow".to_string()));
        }
        info!(follower_id, following_id, "follow removed");
        Ok(())
    }

    pub(crate) async fn is_following(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<bool, DomainError> {
        validate_positive_id("follower_id", follower_id)?;
        validate_positive_id("following_id", following_id)?;
        self.follows.is_following(follower_id, following_id).await
    }

    pub(crate) async fn counts(&self, user_id: i64) -> Result<FollowCounts, DomainError> {
        validate_positive_id("user_id", user_id)?;
        self.follows.counts(user_id).await
    }

    pub(crate) async fn followed_users(
        &self,
        follower_id: i64,
    ) -> Result<Vec<AuthorSummary>, DomainError> {
        validate_positive_id("follower_id", follower_id)?;
        self.follows.followed_users(follower_id).await
    }
}
