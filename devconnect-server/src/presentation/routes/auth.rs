use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};

use crate::presentation::AppState;
use crate::presentation::handlers::auth::{
    login, me, oauth_authorize, oauth_callback, register, set_username,
};
use crate::presentation::middleware::auth::jwt_auth_middleware;

pub(crate) fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/oauth/{provider}/authorize", get(oauth_authorize))
        .route("/oauth/{provider}/callback", get(oauth_callback));

    let protected = Router::new()
        .route("/me", get(me))
        .route("/me/username", put(set_username))
        .layer(middleware::from_fn_with_state(state, jwt_auth_middleware));

    public.merge(protected)
}
