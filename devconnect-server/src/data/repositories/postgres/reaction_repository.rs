use async_trait::async_trait;
use sqlx::PgPool;

use crate::data::reaction_repository::ReactionRepository;
use crate::domain::error::DomainError;
use crate::domain::reaction::{ReactionKind, Reactions};

#[derive(Debug, Clone)]
pub(crate) struct PostgresReactionRepository {
    pool: PgPool,
}

impl PostgresReactionRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReactionRow {
    user_id: i64,
    kind: String,
}

#[async_trait]
impl ReactionRepository for PostgresReactionRepository {
    async fn current_reaction(
        &self,
        post_id: i64,
        user_id: i64,
    ) -> Result<Option<ReactionKind>, DomainError> {
        let kind: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT kind
            FROM reactions
            WHERE post_id = $1 AND user_id = $2
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_reaction_db_error)?;

        kind.map(|(kind,)| parse_kind(&kind)).transpose()
    }

    async fn upsert_reaction(
        &self,
        post_id: i64,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO reactions (post_id, user_id, kind)
            VALUES ($1, $2, $3)
            ON CONFLICT (post_id, user_id)
            DO UPDATE SET kind = EXCLUDED.kind, created_at = NOW()
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_reaction_db_error)?;

        Ok(())
    }

    async fn delete_reaction(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM reactions
            WHERE post_id = $1 AND user_id = $2
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_reaction_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn reactions_for_post(&self, post_id: i64) -> Result<Reactions, DomainError> {
        let rows = sqlx::query_as::<_, ReactionRow>(
            r#"
            SELECT user_id, kind
            FROM reactions
            WHERE post_id = $1
            ORDER BY created_at, user_id
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_reaction_db_error)?;

        let mut reactions = Reactions::default();
        for row in rows {
            match parse_kind(&row.kind)? {
                ReactionKind::Happy => reactions.happy.push(row.user_id),
                ReactionKind::Sad => reactions.sad.push(row.user_id),
            }
        }
        Ok(reactions)
    }
}

fn parse_kind(value: &str) -> Result<ReactionKind, DomainError> {
    value
        .parse()
        .map_err(|err: DomainError| DomainError::Unexpected(err.to_string()))
}

fn map_reaction_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23503")
    {
        return DomainError::NotFound("post".to_string());
    }
    DomainError::Unexpected(err.to_string())
}
