use axum::Router;
use axum::middleware;
use axum::routing::get;

use crate::presentation::AppState;
use crate::presentation::handlers::posts::user_posts;
use crate::presentation::handlers::users::{
    follow, follow_counts, follow_status, followed_users, get_profile, get_user, unfollow,
};
use crate::presentation::middleware::auth::jwt_auth_middleware;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/{id}", get(get_user))
        .route("/{id}/posts", get(user_posts))
        .route("/{id}/follow-counts", get(follow_counts))
        .route("/{id}/following", get(followed_users));

    let protected = Router::new()
        .route(
            "/{id}/follow",
            get(follow_status).post(follow).delete(unfollow),
        )
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware));

    public.merge(protected)
}

pub(crate) fn profile_router() -> Router<AppState> {
    Router::new().route("/api/profiles/{username}", get(get_profile))
}
