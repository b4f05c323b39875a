use async_trait::async_trait;

use crate::domain::comment::{Comment, ParentComment};
use crate::domain::error::DomainError;

#[derive(Debug, Clone)]
pub(crate) struct NewComment {
    pub(crate) post_id: i64,
    pub(crate) author_id: i64,
    pub(crate) parent_id: Option<i64>,
    pub(crate) content: String,
}

#[async_trait]
pub(crate) trait CommentRepository: Send + Sync {
    async fn create_comment(&self, input: NewComment) -> Result<Comment, DomainError>;
    async fn find_parent(&self, comment_id: i64) -> Result<Option<ParentComment>, DomainError>;
    async fn list_for_posts(&self, post_ids: &[i64]) -> Result<Vec<Comment>, DomainError>;
}
