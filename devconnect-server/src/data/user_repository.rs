use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::user::{ExternalProfile, User};

#[derive(Debug, Clone)]
pub(crate) struct UserCredentials {
    pub(crate) user: User,
    pub(crate) password_hash: String,
}

#[derive(Debug, Clone)]
pub(crate) struct NewUser {
    pub(crate) username: String,
    pub(crate) email: String,
    pub(crate) password_hash: String,
}

#[async_trait]
pub(crate) trait UserRepository: Send + Sync {
    async fn create_user(&self, input: NewUser) -> Result<User, DomainError>;
    async fn upsert_oauth_profile(&self, profile: ExternalProfile) -> Result<User, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError>;
    /// Password credentials; OAuth-only accounts yield `None`.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserCredentials>, DomainError>;
    async fn find_profile(&self, username: &str) -> Result<Option<User>, DomainError>;
    async fn set_username(&self, user_id: i64, username: &str) -> Result<Option<User>, DomainError>;
}
