use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::notification::{Audience, Notification, NotificationTemplate};

#[async_trait]
pub(crate) trait NotificationRepository: Send + Sync {
    /// Stores one notification per audience member (the actor excluded) and returns them.
    async fn create_for(
        &self,
        audience: Audience,
        template: NotificationTemplate,
    ) -> Result<Vec<Notification>, DomainError>;
    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>, DomainError>;
    async fn unread_count(&self, user_id: i64) -> Result<i64, DomainError>;
    async fn mark_read(&self, user_id: i64, ids: &[i64]) -> Result<u64, DomainError>;
    async fn mark_all_read(&self, user_id: i64) -> Result<u64, DomainError>;
}
