use async_trait::async_trait;

use crate::domain::error::DomainError;
use crate::domain::user::AuthProvider;

#[derive(Debug, Clone)]
pub(crate) struct NewOAuthState {
    pub(crate) state: String,
    pub(crate) provider: AuthProvider,
    pub(crate) pkce_verifier: String,
    pub(crate) ttl_seconds: i64,
}

#[async_trait]
pub(crate) trait OAuthStateRepository: Send + Sync {
    async fn save_state(&self, input: NewOAuthState) -> Result<(), DomainError>;
    /// Deletes the state and returns its PKCE verifier if it exists, matches the provider
    /// and has not expired.
    async fn consume_state(
        &self,
        state: &str,
        provider: AuthProvider,
    ) -> Result<Option<String>, DomainError>;
}
