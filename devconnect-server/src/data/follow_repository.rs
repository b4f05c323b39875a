use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::follow::{Follow, FollowCounts};
use crate::domain::user::AuthorSummary;

#[async_trait]
pub(crate) trait FollowRepository: Send + Sync {
    async fn create_follow(&self, follower_id: i64, following_id: i64) -> Result<Follow, DomainError>;
    async fn delete_follow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError>;
    async fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError>;
    async fn counts(&self, user_id: i64) -> Result<FollowCounts, DomainError>;
    async fn followed_users(&self, follower_id: i64) -> Result<Vec<AuthorSummary>, DomainError>;
}
