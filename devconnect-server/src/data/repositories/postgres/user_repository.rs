use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::user_repository::{NewUser, UserCredentials, UserRepository};
use crate::domain::error::DomainError;
use crate::domain::user::{AuthProvider, ExternalProfile, User};

#[derive(Debug, Clone)]
pub(crate) struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, username, full_name, email, avatar_url, provider, username_set, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: Option<String>,
    full_name: Option<String>,
    email: String,
    avatar_url: Option<String>,
    provider: String,
    username_set: bool,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserCredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create_user(&self, input: NewUser) -> Result<User, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, provider, username_set)
            VALUES ($1, $2, $3, 'password', TRUE)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        map_row_to_user(row)
    }

    async fn upsert_oauth_profile(&self, profile: ExternalProfile) -> Result<User, DomainError> {
        let sql = format!(
            r#"
            INSERT INTO users (email, full_name, avatar_url, provider, provider_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider, provider_id)
            DO UPDATE SET
                email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                avatar_url = EXCLUDED.avatar_url
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&profile.email)
            .bind(&profile.full_name)
            .bind(&profile.avatar_url)
            .bind(profile.provider.as_str())
            .bind(&profile.provider_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        map_row_to_user(row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        row.map(map_row_to_user).transpose()
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DomainError> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserCredentialsRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = map_row_to_user(row.user)?;
        // OAuth accounts have no password and cannot sign in with one.
        Ok(row.password_hash.map(|password_hash| UserCredentials {
            user,
            password_hash,
        }))
    }

    async fn find_profile(&self, username: &str) -> Result<Option<User>, DomainError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        row.map(map_row_to_user).transpose()
    }

    async fn set_username(&self, user_id: i64, username: &str) -> Result<Option<User>, DomainError> {
        let sql = format!(
            r#"
            UPDATE users
            SET username = $2,
                username_set = TRUE
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_user_db_error)?;

        row.map(map_row_to_user).transpose()
    }
}

fn map_row_to_user(row: UserRow) -> Result<User, DomainError> {
    let provider: AuthProvider = row
        .provider
        .parse()
        .map_err(|err: DomainError| DomainError::Unexpected(err.to_string()))?;
    User::new(
        row.id,
        row.username,
        row.full_name,
        row.email,
        row.avatar_url,
        provider,
        row.username_set,
        row.created_at,
    )
    .map_err(|err| DomainError::Unexpected(err.to_string()))
}

fn map_user_db_error(err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23505")
    {
        let resource = match db_err.constraint() {
            Some("users_username_key" | "users_username_lower_key") => "username",
            Some("users_email_password_key") => "email",
            _ => "user",
        };
        return DomainError::AlreadyExists(resource.to_string());
    }
    DomainError::Unexpected(err.to_string())
}
