use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::presentation::AppState;
use crate::presentation::app_error::{AppError, AppResult};
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UploadedImageDto {
    pub(crate) url: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct DeleteImageDto {
    #[validate(url)]
    pub(crate) url: String,
}

#[utoipa::path(
    post,
    path = "/api/media/images",
    tag = "media",
    security(("bearer_auth" = [])),
    request_body(content = Vec<u8>, description = "Raw image bytes", content_type = "image/*"),
    responses(
        (status = 201, description = "Image stored", body = UploadedImageDto),
        (status = 400, description = "Not an image, empty or too large"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Body exceeds the upload limit"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn upload_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<UploadedImageDto>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing Content-Type header".to_string()))?;

    let url = state
        .media_service
        .upload_image(user.user_id, content_type, &body)
        .await?;

    Ok((StatusCode::CREATED, Json(UploadedImageDto { url })))
}

#[utoipa::path(
    delete,
    path = "/api/media/images",
    tag = "media",
    security(("bearer_auth" = [])),
    request_body = DeleteImageDto,
    responses(
        (status = 204, description = "Image removed (or already gone)"),
        (status = 400, description = "Not an uploaded image URL"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Image belongs to another user"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn delete_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(dto): Json<DeleteImageDto>,
) -> AppResult<StatusCode> {
    dto.validate()?;

    state
        .media_service
        .delete_image(user.user_id, &dto.url)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
