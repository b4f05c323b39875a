use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::presentation::AppState;
use crate::presentation::handlers::notifications::{
    list_notifications, mark_all_read, mark_read, unread_count,
};
use crate::presentation::middleware::auth::jwt_auth_middleware;

/// Every notification route acts on the caller's own inbox.
pub(crate) fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}
