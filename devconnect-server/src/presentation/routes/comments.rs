use axum::Router;
use axum::routing::get;

use crate::presentation::AppState;
use crate::presentation::handlers::comments::list_comments;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_comments))
}
