use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::domain::reaction::ReactionKind;
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::handlers::posts::ReactionsDto;
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct ToggleReactionDto {
    /// `happy` or `sad`
    pub(crate) kind: String,
}

#[utoipa::path(
    post,
    path = "/api/posts/{id}/reactions",
    tag = "reactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    request_body = ToggleReactionDto,
    responses(
        (status = 200, description = "Reactions of the post after the toggle", body = ReactionsDto),
        (status = 400, description = "Unknown reaction kind"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn toggle_reaction(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(post_id): Path<i64>,
    Json(dto): Json<ToggleReactionDto>,
) -> AppResult<(StatusCode, Json<ReactionsDto>)> {
    let kind: ReactionKind = dto.kind.parse()?;

    let reactions = state
        .reaction_service
        .toggle_reaction(user.user_id, post_id, kind)
        .await?;

    Ok((StatusCode::OK, Json(reactions.into())))
}
