use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::post_repository::{NewPost, Pagination, PostOwnership, PostRepository};
use crate::domain::error::DomainError;
use crate::domain::post::PostDetails;
use crate::domain::reaction::Reactions;
use crate::domain::user::AuthorSummary;

#[derive(Debug, Clone)]
pub(crate) struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Post row joined with its author, topics, comment count and reaction lists.
const POST_DETAILS_SELECT: &str = r#"
    SELECT
        p.id,
        p.content,
        p.image_url,
        p.created_at,
        u.id AS author_id,
        u.username AS author_username,
        u.full_name AS author_full_name,
        u.avatar_url AS author_avatar_url,
        ARRAY(
            SELECT pt.topic_id FROM post_topics pt
            WHERE pt.post_id = p.id
            ORDER BY pt.topic_id
        ) AS topics,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count,
        ARRAY(
            SELECT r.user_id FROM reactions r
            WHERE r.post_id = p.id AND r.kind = 'happy'
            ORDER BY r.created_at, r.user_id
        ) AS happy,
        ARRAY(
            SELECT r.user_id FROM reactions r
            WHERE r.post_id = p.id AND r.kind = 'sad'
            ORDER BY r.created_at, r.user_id
        ) AS sad
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

const TOPIC_FILTER: &str = r#"
    ($1::text[] IS NULL OR EXISTS (
        SELECT 1 FROM post_topics ft
        WHERE ft.post_id = p.id AND ft.topic_id = ANY($1)
    ))
"#;

#[derive(sqlx::FromRow)]
struct PostDetailsRow {
    id: i64,
    content: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    author_id: i64,
    author_username: Option<String>,
    author_full_name: Option<String>,
    author_avatar_url: Option<String>,
    topics: Vec<String>,
    comments_count: i64,
    happy: Vec<i64>,
    sad: Vec<i64>,
}

#[derive(sqlx::FromRow)]
struct PostOwnershipRow {
    id: i64,
    author_id: i64,
    image_url: Option<String>,
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create_post(&self, input: NewPost) -> Result<PostDetails, DomainError> {
        let mut tx = self.pool.begin().await.map_err(map_post_db_error)?;

        let (post_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO posts (author_id, content, image_url)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(input.author_id)
        .bind(&input.content)
        .bind(&input.image_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_post_db_error)?;

        if !input.topics.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO post_topics (post_id, topic_id)
                SELECT $1, topic_id FROM UNNEST($2::text[]) AS topic_id
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(post_id)
            .bind(&input.topics)
            .execute(&mut *tx)
            .await
            .map_err(map_post_db_error)?;
        }

        tx.commit().await.map_err(map_post_db_error)?;

        self.get_post_details(post_id)
            .await?
            .ok_or_else(|| DomainError::Unexpected(format!("post {post_id} vanished after insert")))
    }

    async fn get_post_details(&self, id: i64) -> Result<Option<PostDetails>, DomainError> {
        let sql = format!("{POST_DETAILS_SELECT} WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostDetailsRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        row.map(map_row_to_post_details).transpose()
    }

    async fn get_ownership(&self, id: i64) -> Result<Option<PostOwnership>, DomainError> {
        let row = sqlx::query_as::<_, PostOwnershipRow>(
            r#"
            SELECT id, author_id, image_url
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_post_db_error)?;

        Ok(row.map(|row| PostOwnership {
            id: row.id,
            author_id: row.author_id,
            image_url: row.image_url,
        }))
    }

    async fn delete_post(&self, id: i64) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_post_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_feed(
        &self,
        pagination: Pagination,
        topics: Option<Vec<String>>,
    ) -> Result<Vec<PostDetails>, DomainError> {
        let sql = format!(
            "{POST_DETAILS_SELECT} WHERE {TOPIC_FILTER} \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, PostDetailsRow>(&sql)
            .bind(topics)
            .bind(i64::from(pagination.limit))
            .bind(i64::from(pagination.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        rows.into_iter().map(map_row_to_post_details).collect()
    }

    async fn total_posts(&self, topics: Option<Vec<String>>) -> Result<i64, DomainError> {
        let sql = format!("SELECT COUNT(*) FROM posts p WHERE {TOPIC_FILTER}");
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(topics)
            .fetch_one(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        Ok(count)
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<PostDetails>, DomainError> {
        let sql = format!(
            "{POST_DETAILS_SELECT} WHERE p.author_id = $1 ORDER BY p.created_at DESC, p.id DESC"
        );
        let rows = sqlx::query_as::<_, PostDetailsRow>(&sql)
            .bind(author_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        rows.into_iter().map(map_row_to_post_details).collect()
    }

    async fn list_following(&self, follower_id: i64) -> Result<Vec<PostDetails>, DomainError> {
        let sql = format!(
            "{POST_DETAILS_SELECT} \
             WHERE p.author_id IN (SELECT f.following_id FROM follows f WHERE f.follower_id = $1) \
             ORDER BY p.created_at DESC, p.id DESC"
        );
        let rows = sqlx::query_as::<_, PostDetailsRow>(&sql)
            .bind(follower_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_post_db_error)?;

        rows.into_iter().map(map_row_to_post_details).collect()
    }
}

fn map_row_to_post_details(row: PostDetailsRow) -> Result<PostDetails, DomainError> {
    let author = AuthorSummary {
        id: row.author_id,
        username: row.author_username,
        full_name: row.author_full_name,
        avatar_url: row.author_avatar_url,
    };
    let reactions = Reactions {
        happy: row.happy,
        sad: row.sad,
    };
    PostDetails::new(
        row.id,
        row.content,
        row.image_url,
        author,
        row.topics,
        row.comments_count,
        reactions,
        row.created_at,
    )
    .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn map_post_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23503")
    {
        return DomainError::NotFound("author".to_string());
    }
    DomainError::Unexpected(err.to_string())
}
