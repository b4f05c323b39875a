use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};

use crate::presentation::AppState;
use crate::presentation::handlers::comments::create_comment;
use crate::presentation::handlers::posts::{
    create_post, delete_post, feed, following_feed, get_post, list_topics,
};
use crate::presentation::handlers::reactions::toggle_reaction;
use crate::presentation::middleware::auth::jwt_auth_middleware;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(feed))
        .route("/{id}", get(get_post));

    let protected = Router::new()
        .route("/", post(create_post))
        .route("/following", get(following_feed))
        .route("/{id}", delete(delete_post))
        .route("/{id}/comments", post(create_comment))
        .route("/{id}/reactions", post(toggle_reaction))
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware));

    public.merge(protected)
}

pub(crate) fn topics_router() -> Router<AppState> {
    Router::new().route("/api/topics", get(list_topics))
}
