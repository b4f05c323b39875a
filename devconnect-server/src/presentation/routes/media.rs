use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::post;

use crate::presentation::AppState;
use crate::presentation::handlers::media::{delete_image, upload_image};
use crate::presentation::middleware::auth::jwt_auth_middleware;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    let max_image_bytes = state.media_service.max_image_bytes();

    Router::new()
        .route("/images", post(upload_image).delete(delete_image))
        .layer(DefaultBodyLimit::max(max_image_bytes))
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}
