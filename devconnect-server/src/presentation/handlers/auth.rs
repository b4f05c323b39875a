use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::auth_service::AuthResult;
use crate::domain::user::{AuthProvider, LoginRequest, RegisterRequest, SetUsernameRequest, User};
use crate::presentation::AppState;
use crate::presentation::app_error::{AppError, AppResult};
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct RegisterDto {
    #[validate(length(min = 3, max = 64))]
    pub(crate) username: String,
    #[validate(email)]
    pub(crate) email: String,
    #[validate(length(min = 8, max = 128))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct LoginDto {
    #[validate(length(min = 1, max = 64))]
    pub(crate) username: String,
    #[validate(length(min = 1))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct SetUsernameDto {
    #[validate(length(min = 3, max = 64))]
    pub(crate) username: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct OAuthCallbackQuery {
    pub(crate) code: Option<String>,
    pub(crate) state: Option<String>,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct AuthResponseDto {
    pub(crate) access_token: String,
    pub(crate) user: UserDto,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct AuthorizeUrlDto {
    pub(crate) authorize_url: String,
}

/// The signed-in user's own profile. `username` stays null until it is chosen.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UserDto {
    pub(crate) id: i64,
    pub(crate) username: Option<String>,
    pub(crate) full_name: Option<String>,
    pub(crate) email: String,
    pub(crate) avatar_url: Option<String>,
    pub(crate) provider: String,
    pub(crate) username_set: bool,
    pub(crate) created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            avatar_url: user.avatar_url,
            provider: user.provider.to_string(),
            username_set: user.username_set,
            created_at: user.created_at,
        }
    }
}

impl From<AuthResult> for AuthResponseDto {
    fn from(result: AuthResult) -> Self {
        Self {
            access_token: result.access_token,
            user: result.user.into(),
        }
    }
}

fn oauth_provider(raw: &str) -> AppResult<AuthProvider> {
    let provider: AuthProvider = raw.parse()?;
    if !provider.is_oauth() {
        return Err(AppError::BadRequest(format!(
            "'{provider}' is not an oauth provider"
        )));
    }
    Ok(provider)
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterDto,
    responses(
        (status = 201, description = "Registered successfully", body = AuthResponseDto),
        (status = 400, description = "Validation error"),
        (status = 409, description = "User already exists"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn register(
    State(state): State<AppState>,
    Json(dto): Json<RegisterDto>,
) -> AppResult<(StatusCode, Json<AuthResponseDto>)> {
    dto.validate()?;

    let req = RegisterRequest {
        username: dto.username,
        email: dto.email,
        password: dto.password,
    };

    let result = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginDto,
    responses(
        (status = 200, description = "Login successful", body = AuthResponseDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    Json(dto): Json<LoginDto>,
) -> AppResult<(StatusCode, Json<AuthResponseDto>)> {
    dto.validate()?;

    let req = LoginRequest {
        username: dto.username,
        password: dto.password,
    };

    let result = state.auth_service.login(req).await?;

    Ok((StatusCode::OK, Json(result.into())))
}

#[utoipa::path(
    get,
    path = "/api/auth/oauth/{provider}/authorize",
    tag = "auth",
    params(
        ("provider" = String, Path, description = "github or google")
    ),
    responses(
        (status = 200, description = "Provider URL to redirect the browser to", body = AuthorizeUrlDto),
        (status = 400, description = "Unknown or disabled provider"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn oauth_authorize(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<(StatusCode, Json<AuthorizeUrlDto>)> {
    let provider = oauth_provider(&provider)?;
    let authorize_url = state.auth_service.oauth_authorize(provider).await?;

    Ok((StatusCode::OK, Json(AuthorizeUrlDto { authorize_url })))
}

#[utoipa::path(
    get,
    path = "/api/auth/oauth/{provider}/callback",
    tag = "auth",
    params(
        ("provider" = String, Path, description = "github or google"),
        OAuthCallbackQuery
    ),
    responses(
        (status = 200, description = "Signed in", body = AuthResponseDto),
        (status = 400, description = "Invalid state or code, or provider error"),
        (status = 401, description = "Provider rejected the code"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
) -> AppResult<(StatusCode, Json<AuthResponseDto>)> {
    let provider = oauth_provider(&provider)?;
    if let Some(error) = query.error {
        return Err(AppError::BadRequest(format!("oauth provider error: {error}")));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("missing 'code' parameter".to_string()))?;
    let oauth_state = query
        .state
        .ok_or_else(|| AppError::BadRequest("missing 'state' parameter".to_string()))?;

    let result = state
        .auth_service
        .oauth_callback(provider, &code, &oauth_state)
        .await?;

    Ok((StatusCode::OK, Json(result.into())))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserDto),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User no longer exists"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<UserDto>)> {
    let profile = state.auth_service.me(user.user_id).await?;

    Ok((StatusCode::OK, Json(profile.into())))
}

#[utoipa::path(
    put,
    path = "/api/auth/me/username",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = SetUsernameDto,
    responses(
        (status = 200, description = "Username set, fresh token issued", body = AuthResponseDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Username taken"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn set_username(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(dto): Json<SetUsernameDto>,
) -> AppResult<(StatusCode, Json<AuthResponseDto>)> {
    dto.validate()?;

    let result = state
        .auth_service
        .set_username(
            user.user_id,
            SetUsernameRequest {
                username: dto.username,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(result.into())))
}
