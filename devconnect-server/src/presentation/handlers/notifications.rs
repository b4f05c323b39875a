use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::notification::Notification;
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::handlers::posts::AuthorDto;
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct NotificationDto {
    pub(crate) id: i64,
    pub(crate) kind: String,
    pub(crate) title: String,
    pub(crate) message: String,
    pub(crate) is_read: bool,
    pub(crate) related_post_id: Option<i64>,
    pub(crate) related_comment_id: Option<i64>,
    pub(crate) actor: AuthorDto,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct MarkReadDto {
    #[validate(length(min = 1, max = 100))]
    pub(crate) ids: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UnreadCountDto {
    pub(crate) unread: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct MarkedReadDto {
    pub(crate) updated: u64,
}

impl From<Notification> for NotificationDto {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind.to_string(),
            title: notification.title,
            message: notification.message,
            is_read: notification.is_read,
            related_post_id: notification.related_post_id,
            related_comment_id: notification.related_comment_id,
            actor: notification.actor.into(),
            created_at: notification.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Latest notifications, newest first", body = [NotificationDto]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<Vec<NotificationDto>>)> {
    let notifications = state.notification_service.list(user.user_id).await?;

    Ok((
        StatusCode::OK,
        Json(notifications.into_iter().map(NotificationDto::from).collect()),
    ))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unread notifications", body = UnreadCountDto),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn unread_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<UnreadCountDto>)> {
    let unread = state.notification_service.unread_count(user.user_id).await?;

    Ok((StatusCode::OK, Json(UnreadCountDto { unread })))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read",
    tag = "notifications",
    security(("bearer_auth" = [])),
    request_body = MarkReadDto,
    responses(
        (status = 200, description = "Own notifications marked as read", body = MarkedReadDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(dto): Json<MarkReadDto>,
) -> AppResult<(StatusCode, Json<MarkedReadDto>)> {
    dto.validate()?;

    let updated = state
        .notification_service
        .mark_read(user.user_id, &dto.ids)
        .await?;

    Ok((StatusCode::OK, Json(MarkedReadDto { updated })))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All notifications marked as read", body = MarkedReadDto),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<MarkedReadDto>)> {
    let updated = state.notification_service.mark_all_read(user.user_id).await?;

    Ok((StatusCode::OK, Json(MarkedReadDto { updated })))
}
