use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::reaction::{ReactionKind, Reactions};

#[async_trait]
pub(crate) trait ReactionRepository: Send + Sync {
    async fn current_reaction(
        &self,
        post_id: i64,
        user_id: i64,
    ) -> Result<Option<ReactionKind>, DomainError>;
    async fn upsert_reaction(
        &self,
        post_id: i64,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<(), DomainError>;
    async fn delete_reaction(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError>;
    async fn reactions_for_post(&self, post_id: i64) -> Result<Reactions, DomainError>;
}
