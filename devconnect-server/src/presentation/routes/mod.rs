use axum::Router;

use super::AppState;

pub(crate) mod auth;
pub(crate) mod comments;
pub(crate) mod media;
pub(crate) mod notifications;
pub(crate) mod posts;
pub(crate) mod users;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth::router(state.clone()))
        .nest("/api/posts", posts::router(state.clone()))
        .nest("/api/comments", comments::router())
        .nest("/api/users", users::router(state.clone()))
        .nest("/api/notifications", notifications::router(state.clone()))
        .nest("/api/media", media::router(state))
        .merge(users::profile_router())
        .merge(posts::topics_router())
}
