use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::follow::{Follow, FollowCounts};
use crate::domain::user::User;
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::handlers::posts::AuthorDto;
use crate::presentation::middleware::auth::AuthenticatedUser;

/// Public view of a user; the e-mail address is never exposed here.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ProfileDto {
    pub(crate) id: i64,
    pub(crate) username: Option<String>,
    pub(crate) full_name: Option<String>,
    pub(crate) avatar_url: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct FollowCountsDto {
    pub(crate) followers: i64,
    pub(crate) following: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct FollowStatusDto {
    pub(crate) following: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct FollowDto {
    pub(crate) id: i64,
    pub(crate) follower_id: i64,
    pub(crate) following_id: i64,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<User> for ProfileDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
        }
    }
}

impl From<FollowCounts> for FollowCountsDto {
    fn from(counts: FollowCounts) -> Self {
        Self {
            followers: counts.followers,
            following: counts.following,
        }
    }
}

impl From<Follow> for FollowDto {
    fn from(follow: Follow) -> Self {
        Self {
            id: follow.id,
            follower_id: follow.follower_id,
            following_id: follow.following_id,
            created_at: follow.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/profiles/{username}",
    tag = "users",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 200, description = "Profile found", body = ProfileDto),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<(StatusCode, Json<ProfileDto>)> {
    let user = state.user_service.profile(&username).await?;

    Ok((StatusCode::OK, Json(user.into())))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Profile found", body = ProfileDto),
        (status = 404, description = "No such user"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<ProfileDto>)> {
    let user = state.user_service.get(id).await?;

    Ok((StatusCode::OK, Json(user.into())))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/follow-counts",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Follower and following counts", body = FollowCountsDto),
        (status = 400, description = "Validation error"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn follow_counts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<FollowCountsDto>)> {
    let counts = state.follow_service.counts(id).await?;

    Ok((StatusCode::OK, Json(counts.into())))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/following",
    tag = "users",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Users followed by the user, latest follow first", body = [AuthorDto]),
        (status = 400, description = "Validation error"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn followed_users(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<Vec<AuthorDto>>)> {
    let users = state.follow_service.followed_users(id).await?;

    Ok((
        StatusCode::OK,
        Json(users.into_iter().map(AuthorDto::from).collect()),
    ))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/follow",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User to check")
    ),
    responses(
        (status = 200, description = "Whether the caller follows the user", body = FollowStatusDto),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn follow_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<FollowStatusDto>)> {
    let following = state.follow_service.is_following(user.user_id, id).await?;

    Ok((StatusCode::OK, Json(FollowStatusDto { following })))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/follow",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User to follow")
    ),
    responses(
        (status = 201, description = "Now following", body = FollowDto),
        (status = 400, description = "Cannot follow yourself"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Already following"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn follow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<FollowDto>)> {
    let follow = state.follow_service.follow(user.user_id, id).await?;

    Ok((StatusCode::CREATED, Json(follow.into())))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/follow",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User to unfollow")
    ),
    responses(
        (status = 204, description = "Unfollowed"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not following"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn unfollow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.follow_service.unfollow(user.user_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
