use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::notification_repository::NotificationRepository;
use crate::domain::error::DomainError;
use crate::domain::notification::{Audience, Notification, NotificationTemplate};
use crate::domain::user::AuthorSummary;

#[derive(Debug, Clone)]
pub(crate) struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const NOTIFICATION_COLUMNS: &str = r#"
    n.id,
    n.recipient_id,
    n.kind,
    n.title,
    n.message,
    n.is_read,
    n.related_post_id,
    n.related_comment_id,
    n.created_at,
    u.id AS actor_id,
    u.username AS actor_username,
    u.full_name AS actor_full_name,
    u.avatar_url AS actor_avatar_url
"#;

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    recipient_id: i64,
    kind: String,
    title: String,
    message: String,
    is_read: bool,
    related_post_id: Option<i64>,
    related_comment_id: Option<i64>,
    created_at: DateTime<Utc>,
    actor_id: i64,
    actor_username: Option<String>,
    actor_full_name: Option<String>,
    actor_avatar_url: Option<String>,
}

fn audience_sql(audience: &Audience) -> &'static str {
    match audience {
        Audience::Users(_) => "SELECT id FROM users WHERE id = ANY($1::bigint[])",
        Audience::FollowersOf(_) => "SELECT follower_id AS id FROM follows WHERE following_id = $1",
        Audience::Usernames(_) => "SELECT id FROM users WHERE lower(username) = ANY($1::text[])",
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn create_for(
        &self,
        audience: Audience,
        template: NotificationTemplate,
    ) -> Result<Vec<Notification>, DomainError> {
        let is_empty = match &audience {
            Audience::Users(ids) => ids.is_empty(),
            Audience::Usernames(names) => names.is_empty(),
            Audience::FollowersOf(_) => false,
        };
        if is_empty {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            WITH recipients AS (
                SELECT DISTINCT id FROM ({audience}) AS audience
            ),
            inserted AS (
                INSERT INTO notifications
                    (recipient_id, actor_id, kind, title, message, related_post_id, related_comment_id)
                SELECT r.id, $2, $3, $4, $5, $6, $7
                FROM recipients r
                WHERE r.id <> $2
                RETURNING *
            )
            SELECT {NOTIFICATION_COLUMNS}
            FROM inserted n
            JOIN users u ON u.id = n.actor_id
            ORDER BY n.recipient_id
            "#,
            audience = audience_sql(&audience),
        );

        let query = sqlx::query_as::<_, NotificationRow>(&sql);
        let query = match audience {
            Audience::Users(ids) => query.bind(ids),
            Audience::FollowersOf(user_id) => query.bind(user_id),
            Audience::Usernames(names) => query.bind(names),
        };
        let rows = query
            .bind(template.actor_id)
            .bind(template.kind.as_str())
            .bind(&template.title)
            .bind(&template.message)
            .bind(template.related_post_id)
            .bind(template.related_comment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_notification_db_error)?;

        rows.into_iter().map(map_row_to_notification).collect()
    }

    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>, DomainError> {
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications n
            JOIN users u ON u.id = n.actor_id
            WHERE n.recipient_id = $1
            ORDER BY n.created_at DESC, n.id DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_notification_db_error)?;

        rows.into_iter().map(map_row_to_notification).collect()
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, DomainError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE recipient_id = $1 AND NOT is_read
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_notification_db_error)?;

        Ok(count)
    }

    async fn mark_read(&self, user_id: i64, ids: &[i64]) -> Result<u64, DomainError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE recipient_id = $1 AND id = ANY($2) AND NOT is_read
            "#,
        )
        .bind(user_id)
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(map_notification_db_error)?;

        Ok(result.rows_affected())
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE recipient_id = $1 AND NOT is_read
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(map_notification_db_error)?;

        Ok(result.rows_affected())
    }
}

fn map_row_to_notification(row: NotificationRow) -> Result<Notification, DomainError> {
    let kind = row
        .kind
        .parse()
        .map_err(|err: DomainError| DomainError::Unexpected(err.to_string()))?;
    let actor = AuthorSummary {
        id: row.actor_id,
        username: row.actor_username,
        full_name: row.actor_full_name,
        avatar_url: row.actor_avatar_url,
    };
    Notification::new(
        row.id,
        row.recipient_id,
        kind,
        row.title,
        row.message,
        row.is_read,
        row.related_post_id,
        row.related_comment_id,
        actor,
        row.created_at,
    )
    .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn map_notification_db_error(err: sqlx::Error) -> DomainError {
    DomainError::Unexpected(err.to_string())
}
