use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::follow_repository::FollowRepository;
use crate::domain::error::DomainError;
use crate::domain::follow::{Follow, FollowCounts};
use crate::domain::user::AuthorSummary;

#[derive(Debug, Clone)]
pub(crate) struct PostgresFollowRepository {
    pool: PgPool,
}

impl PostgresFollowRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FollowRow {
    id: i64,
    follower_id: i64,
    following_id: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct FollowCountsRow {
    followers: i64,
    following: i64,
}

#[derive(sqlx::FromRow)]
struct FollowedUserRow {
    id: i64,
    username: Option<String>,
    full_name: Option<String>,
    avatar_url: Option<String>,
}

#[async_trait]
impl FollowRepository for PostgresFollowRepository {
    async fn create_follow(
        &self,
        follower_id: i64,
        following_id: i64,
    ) -> Result<Follow, DomainError> {
        let row = sqlx::query_as::<_, FollowRow>(
            r#"
            INSERT INTO follows (follower_id, following_id)
            VALUES ($1, $2)
            RETURNING id, follower_id, following_id, created_at
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_follow_db_error)?;

        Follow::new(row.id, row.follower_id, row.following_id, row.created_at)
            .map_err(|err| DomainError::Unexpected(err.to_string()))
    }

    async fn delete_follow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM follows
            WHERE follower_id = $1 AND following_id = $2
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&self.pool)
        .await
        .map_err(map_follow_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM follows
                WHERE follower_id = $1 AND following_id = $2
            )
            "#,
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_follow_db_error)?;

        Ok(exists)
    }

    async fn counts(&self, user_id: i64) -> Result<FollowCounts, DomainError> {
        let row = sqlx::query_as::<_, FollowCountsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE following_id = $1) AS followers,
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_follow_db_error)?;

        Ok(FollowCounts {
            followers: row.followers,
            following: row.following,
        })
    }

    async fn followed_users(&self, follower_id: i64) -> Result<Vec<AuthorSummary>, DomainError> {
        let rows = sqlx::query_as::<_, FollowedUserRow>(
            r#"
            SELECT u.id, u.username, u.full_name, u.avatar_url
            FROM follows f
            JOIN users u ON u.id = f.following_id
            WHERE f.follower_id = $1
            ORDER BY f.created_at DESC, f.id DESC
            "#,
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_follow_db_error)?;

        Ok(rows
            .into_iter()
            .map(|row| AuthorSummary {
                id: row.id,
                username: row.username,
                full_name: row.full_name,
                avatar_url: row.avatar_url,
            })
            .collect())
    }
}

fn map_follow_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => return DomainError::AlreadyExists("follow".to_string()),
            Some("23503") => return DomainError::NotFound("user".to_string()),
            Some("23514") => {
                return DomainError::Validation {
                    field: "following_id",
                    message: "users cannot follow themselves",
                };
            }
            _ => {}
        }
    }
    DomainError::Unexpected(err.to_string())
}
