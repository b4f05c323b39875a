use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::comment::{Comment, CreateCommentRequest};
use crate::presentation::AppState;
use crate::presentation::app_error::{AppError, AppResult};
use crate::presentation::handlers::posts::AuthorDto;
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct CreateCommentDto {
    #[validate(length(min = 1, max = 200))]
    pub(crate) content: String,
    #[validate(range(min = 1))]
    pub(crate) parent_id: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct CommentsQuery {
    /// Comma separated post ids
    pub(crate) post_ids: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct CommentDto {
    pub(crate) id: i64,
    pub(crate) post_id: i64,
    pub(crate) parent_id: Option<i64>,
    pub(crate) author: AuthorDto,
    pub(crate) content: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author: comment.author.into(),
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

fn parse_post_ids(raw: &str) -> AppResult<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("invalid post id '{id}'")))
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/comments",
    tag = "comments",
    params(CommentsQuery),
    responses(
        (status = 200, description = "Flat comment list, oldest first", body = [CommentDto]),
        (status = 400, description = "Validation error"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentsQuery>,
) -> AppResult<(StatusCode, Json<Vec<CommentDto>>)> {
    let post_ids = parse_post_ids(&query.post_ids)?;

    let comments = state.comment_service.comments_for_posts(&post_ids).await?;

    Ok((
        StatusCode::OK,
        Json(comments.into_iter().map(CommentDto::from).collect()),
    ))
}

#[utoipa::path(
    post,
    path = "/api/posts/{id}/comments",
    tag = "comments",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    request_body = CreateCommentDto,
    responses(
        (status = 201, description = "Comment created", body = CommentDto),
        (status = 400, description = "Validation error or nesting too deep"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Post or parent comment not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn create_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(post_id): Path<i64>,
    Json(dto): Json<CreateCommentDto>,
) -> AppResult<(StatusCode, Json<CommentDto>)> {
    dto.validate()?;

    let req = CreateCommentRequest {
        content: dto.content,
        parent_id: dto.parent_id,
    };

    let comment = state
        .comment_service
        .create_comment(user.user_id, post_id, req)
        .await?;

    Ok((StatusCode::CREATED, Json(comment.into())))
}
