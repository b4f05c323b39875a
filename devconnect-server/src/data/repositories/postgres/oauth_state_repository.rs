use async_trait::async_trait;
use sqlx::PgPool;

use crate::data::oauth_state_repository::{NewOAuthState, OAuthStateRepository};
use crate::domain::error::DomainError;
use crate::domain::user::AuthProvider;

#[derive(Debug, Clone)]
pub(crate) struct PostgresOAuthStateRepository {
    pool: PgPool,
}

impl PostgresOAuthStateRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthStateRepository for PostgresOAuthStateRepository {
    async fn save_state(&self, input: NewOAuthState) -> Result<(), DomainError> {
        // Expired states are swept opportunistically on every new sign-in attempt.
        sqlx::query("DELETE FROM oauth_states WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(map_oauth_state_db_error)?;

        sqlx::query(
            r#"
            INSERT INTO oauth_states (state, provider, pkce_verifier, expires_at)
            VALUES ($1, $2, $3, NOW() + make_interval(secs => $4))
            "#,
        )
        .bind(&input.state)
        .bind(input.provider.as_str())
        .bind(&input.pkce_verifier)
        .bind(input.ttl_seconds as f64)
        .execute(&self.pool)
        .await
        .map_err(map_oauth_state_db_error)?;

        Ok(())
    }

    async fn consume_state(
        &self,
        state: &str,
        provider: AuthProvider,
    ) -> Result<Option<String>, DomainError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM oauth_states
            WHERE state = $1 AND provider = $2 AND expires_at > NOW()
            RETURNING pkce_verifier
            "#,
        )
        .bind(state)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_oauth_state_db_error)?;

        Ok(row.map(|(verifier,)| verifier))
    }
}

fn map_oauth_state_db_error(err: sqlx::Error) -> DomainError {
    DomainError::Unexpected(err.to_string())
}
