use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::comment_repository::{CommentRepository, NewComment};
use crate::domain::comment::{Comment, ParentComment};
use crate::domain::error::DomainError;
use crate::domain::user::AuthorSummary;

#[derive(Debug, Clone)]
pub(crate) struct PostgresCommentRepository {
    pool: PgPool,
}

impl PostgresCommentRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COMMENT_SELECT: &str = r#"
    SELECT
        c.id,
        c.post_id,
        c.parent_id,
        c.content,
        c.created_at,
        u.id AS author_id,
        u.username AS author_username,
        u.full_name AS author_full_name,
        u.avatar_url AS author_avatar_url
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    parent_id: Option<i64>,
    content: String,
    created_at: DateTime<Utc>,
    author_id: i64,
    author_username: Option<String>,
    author_full_name: Option<String>,
    author_avatar_url: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ParentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    depth: i32,
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn create_comment(&self, input: NewComment) -> Result<Comment, DomainError> {
        let sql = format!(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, author_id, parent_id, content)
                VALUES ($1, $2, $3, $4)
                RETURNING id, post_id, author_id, parent_id, content, created_at
            )
            {}
            "#,
            COMMENT_SELECT.replace("FROM comments c", "FROM inserted c")
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(input.post_id)
            .bind(input.author_id)
            .bind(input.parent_id)
            .bind(&input.content)
            .fetch_one(&self.pool)
            .await
            .map_err(map_comment_db_error)?;

        map_row_to_comment(row)
    }

    async fn find_parent(&self, comment_id: i64) -> Result<Option<ParentComment>, DomainError> {
        // Depth is the number of ancestors above the comment.
        let row = sqlx::query_as::<_, ParentRow>(
            r#"
            WITH RECURSIVE ancestors AS (
                SELECT id, parent_id, 0 AS depth
                FROM comments
                WHERE id = $1
                UNION ALL
                SELECT c.id, c.parent_id, a.depth + 1
                FROM comments c
                JOIN ancestors a ON c.id = a.parent_id
            )
            SELECT
                target.id,
                target.post_id,
                target.author_id,
                (SELECT MAX(depth) FROM ancestors)::INT4 AS depth
            FROM comments target
            WHERE target.id = $1
            "#,
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_comment_db_error)?;

        Ok(row.map(|row| ParentComment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            depth: row.depth,
        }))
    }

    async fn list_for_posts(&self, post_ids: &[i64]) -> Result<Vec<Comment>, DomainError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("{COMMENT_SELECT} WHERE c.post_id = ANY($1) ORDER BY c.created_at, c.id");
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_comment_db_error)?;

        rows.into_iter().map(map_row_to_comment).collect()
    }
}

fn map_row_to_comment(row: CommentRow) -> Result<Comment, DomainError> {
    let author = AuthorSummary {
        id: row.author_id,
        username: row.author_username,
        full_name: row.author_full_name,
        avatar_url: row.author_avatar_url,
    };
    Comment::new(
        row.id,
        row.post_id,
        author,
        row.parent_id,
        row.content,
        row.created_at,
    )
    .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn map_comment_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23503")
    {
        return DomainError::NotFound("post".to_string());
    }
    DomainError::Unexpected(err.to_string())
}
