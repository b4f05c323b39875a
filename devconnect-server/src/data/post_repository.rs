use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::post::PostDetails;

#[derive(Debug, Clone)]
pub(crate) struct NewPost {
    pub(crate) author_id: i64,
    pub(crate) content: String,
    pub(crate) image_url: Option<String>,
    pub(crate) topics: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Pagination {
    pub(crate) limit: u32,
    pub(crate) offset: u32,
}

/// Minimal facts about a post needed for authorization and notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PostOwnership {
    pub(crate) id: i64,
    pub(crate) author_id: i64,
    pub(crate) image_url: Option<String>,
}

#[async_trait]
pub(crate) trait PostRepository: Send + Sync {
    async fn create_post(&self, input: NewPost) -> Result<PostDetails, DomainError>;
    async fn get_post_details(&self, id: i64) -> Result<Option<PostDetails>, DomainError>;
    async fn get_ownership(&self, id: i64) -> Result<Option<PostOwnership>, DomainError>;
    async fn delete_post(&self, id: i64) -> Result<bool, DomainError>;
    async fn list_feed(
        &self,
        pagination: Pagination,
        topics: Option<Vec<String>>,
    ) -> Result<Vec<PostDetails>, DomainError>;
    async fn total_posts(&self, topics: Option<Vec<String>>) -> Result<i64, DomainError>;
    async fn list_by_author(&self, author_id: i64) -> Result<Vec<PostDetails>, DomainError>;
    async fn list_following(&self, follower_id: i64) -> Result<Vec<PostDetails>, DomainError>;
}
