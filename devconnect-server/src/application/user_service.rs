use crate::data::user_repository::UserRepository;
use crate::domain::error::{DomainError, validate_positive_id};
use crate::domain::user::{User, normalize_username};

/// Read-only access to public profiles.
pub(crate) struct UserService<U: UserRepository> {
    repo: U,
}

impl<U: UserRepository> UserService<U> {
    pub(crate) fn new(repo: U) -> Self {
        Self { repo }
    }

    pub(crate) async fn profile(&self, username: &str) -> Result<User, DomainError> {
        let username = normalize_username(username)?;
        self.repo
            .find_profile(&username)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("profile '{username}'")))
    }

    pub(crate) async fn get(&self, user_id: i64) -> Result<User, DomainError> {
        validate_positive_id("user_id", user_id)?;
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user {user_id}")))
    }
}
