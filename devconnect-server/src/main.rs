use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;
mod server;

use application::auth_service::AuthService;
use application::comment_service::CommentService;
use application::follow_service::FollowService;
use application::media_service::MediaService;
use application::notification_service::NotificationService;
use application::post_service::PostService;
use application::reaction_service::ReactionService;
use application::user_service::UserService;
use data::repositories::postgres::comment_repository::PostgresCommentRepository;
use data::repositories::postgres::follow_repository::PostgresFollowRepository;
use data::repositories::postgres::notification_repository::PostgresNotificationRepository;
use data::repositories::postgres::oauth_state_repository::PostgresOAuthStateRepository;
use data::repositories::postgres::post_repository::PostgresPostRepository;
use data::repositories::postgres::reaction_repository::PostgresReactionRepository;
use data::repositories::postgres::user_repository::PostgresUserRepository;
use infrastructure::database::{create_pool, run_migrations};
use infrastructure::jwt::JwtService;
use infrastructure::logging::init_logging;
use infrastructure::notification_hub::NotificationHub;
use infrastructure::oauth::OAuth2Gateway;
use infrastructure::object_storage::LocalObjectStorage;
use infrastructure::settings::Settings;
use presentation::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;

    init_logging(&settings.log_level)?;

    let pool = create_pool(&settings.database_url).await?;
    run_migrations(&pool).await?;

    let state = build_state(&settings, pool).await?;

    tokio::try_join!(
        server::run_http(&settings, state.clone()),
        server::run_grpc(&settings, state),
    )?;
    Ok(())
}

async fn build_state(settings: &Settings, pool: PgPool) -> Result<AppState> {
    let storage = LocalObjectStorage::new(&settings.storage_dir);
    tokio::fs::create_dir_all(storage.root())
        .await
        .with_context(|| format!("cannot create storage dir {}", settings.storage_dir))?;
    info!(dir = %settings.storage_dir, "object storage ready");

    let oauth = OAuth2Gateway::from_settings(settings)?;
    let jwt = JwtService::new(&settings.jwt_secret, settings.jwt_ttl_seconds);
    let hub = NotificationHub::new(settings.notification_channel_capacity);

    let notification_service = Arc::new(NotificationService::new(
        PostgresNotificationRepository::new(pool.clone()),
        hub,
    ));
    let media_service = Arc::new(MediaService::new(
        storage,
        &settings.public_base_url,
        settings.max_image_bytes,
    ));

    Ok(AppState {
        auth_service: Arc::new(AuthService::new(
            PostgresUserRepository::new(pool.clone()),
            PostgresOAuthStateRepository::new(pool.clone()),
            oauth,
            jwt,
        )),
        user_service: Arc::new(UserService::new(PostgresUserRepository::new(pool.clone()))),
        post_service: Arc::new(PostService::new(
            PostgresPostRepository::new(pool.clone()),
            Arc::clone(&notification_service),
            Arc::clone(&media_service),
        )),
        comment_service: Arc::new(CommentService::new(
            PostgresCommentRepository::new(pool.clone()),
            PostgresPostRepository::new(pool.clone()),
            Arc::clone(&notification_service),
        )),
        reaction_service: Arc::new(ReactionService::new(
            PostgresReactionRepository::new(pool.clone()),
            PostgresPostRepository::new(pool.clone()),
            PostgresUserRepository::new(pool.clone()),
            Arc::clone(&notification_service),
        )),
        follow_service: Arc::new(FollowService::new(
            PostgresFollowRepository::new(pool.clone()),
            PostgresUserRepository::new(pool),
            Arc::clone(&notification_service),
        )),
        notification_service,
        media_service,
    })
}
