use std::sync::Arc;

use crate::application::auth_service::AuthService;
use crate::application::comment_service::CommentService;
use crate::application::follow_service::FollowService;
use crate::application::media_service::MediaService;
use crate::application::notification_service::NotificationService;
use crate::application::post_service::PostService;
use crate::application::reaction_service::ReactionService;
use crate::application::user_service::UserService;
use crate::data::repositories::postgres::comment_repository::PostgresCommentRepository;
use crate::data::repositories::postgres::follow_repository::PostgresFollowRepository;
use crate::data::repositories::postgres::notification_repository::PostgresNotificationRepository;
use crate::data::repositories::postgres::oauth_state_repository::PostgresOAuthStateRepository;
use crate::data::repositories::postgres::post_repository::PostgresPostRepository;
use crate::data::repositories::postgres::reaction_repository::PostgresReactionRepository;
use crate::data::repositories::postgres::user_repository::PostgresUserRepository;
use crate::infrastructure::oauth::OAuth2Gateway;
use crate::infrastructure::object_storage::LocalObjectStorage;

pub(crate) mod app_error;
pub(crate) mod grpc;
pub(crate) mod handlers;
pub(crate) mod http_handlers;
pub(crate) mod middleware;
pub(crate) mod openapi;
pub(crate) mod routes;

pub(crate) type AppAuthService =
    AuthService<PostgresUserRepository, PostgresOAuthStateRepository, OAuth2Gateway>;
pub(crate) type AppUserService = UserService<PostgresUserRepository>;
pub(crate) type AppPostService =
    PostService<PostgresPostRepository, PostgresNotificationRepository, LocalObjectStorage>;
pub(crate) type AppCommentService =
    CommentService<PostgresCommentRepository, PostgresPostRepository, PostgresNotificationRepository>;
pub(crate) type AppReactionService = ReactionService<
    PostgresReactionRepository,
    PostgresPostRepository,
    PostgresUserRepository,
    PostgresNotificationRepository,
>;
pub(crate) type AppFollowService =
    FollowService<PostgresFollowRepository, PostgresUserRepository, PostgresNotificationRepository>;
pub(crate) type AppNotificationService = NotificationService<PostgresNotificationRepository>;
pub(crate) type AppMediaService = MediaService<LocalObjectStorage>;

/// Shared by the HTTP router and the gRPC service.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) auth_service: Arc<AppAuthService>,
    pub(crate) user_service: Arc<AppUserService>,
    pub(crate) post_service: Arc<AppPostService>,
    pub(crate) comment_service: Arc<AppCommentService>,
    pub(crate) reaction_service: Arc<AppReactionService>,
    pub(crate) follow_service: Arc<AppFollowService>,
    pub(crate) notification_service: Arc<AppNotificationService>,
    pub(crate) media_service: Arc<AppMediaService>,
}
