use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::post_service::FeedPage;
use crate::domain::post::{CreatePostRequest, PostDetails};
use crate::domain::reaction::Reactions;
use crate::domain::topic::Topic;
use crate::domain::user::AuthorSummary;
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct CreatePostDto {
    #[validate(length(min = 1, max = 280))]
    pub(crate) content: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub(crate) topics: Vec<String>,
    #[validate(url)]
    pub(crate) image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct FeedQuery {
    /// Items per page (1..=100)
    #[validate(range(min = 1, max = 100))]
    pub(crate) limit: Option<u32>,
    /// Offset from the beginning
    pub(crate) offset: Option<u32>,
    /// Comma separated topic ids; posts having any of them are kept
    pub(crate) topics: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct AuthorDto {
    pub(crate) id: i64,
    pub(crate) username: Option<String>,
    pub(crate) full_name: Option<String>,
    pub(crate) avatar_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ReactionsDto {
    pub(crate) happy: Vec<i64>,
    pub(crate) sad: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct PostDto {
    pub(crate) id: i64,
    pub(crate) content: String,
    pub(crate) image_url: Option<String>,
    pub(crate) author: AuthorDto,
    pub(crate) topics: Vec<String>,
    pub(crate) comments_count: i64,
    pub(crate) reactions: ReactionsDto,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct FeedResponseDto {
    pub(crate) posts: Vec<PostDto>,
    pub(crate) limit: u32,
    pub(crate) offset: u32,
    pub(crate) total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct TopicDto {
    pub(crate) id: String,
    pub(crate) name: String,
}

impl From<AuthorSummary> for AuthorDto {
    fn from(author: AuthorSummary) -> Self {
        Self {
            id: author.id,
            username: author.username,
            full_name: author.full_name,
            avatar_url: author.avatar_url,
        }
    }
}

impl From<Reactions> for ReactionsDto {
    fn from(reactions: Reactions) -> Self {
        Self {
            happy: reactions.happy,
            sad: reactions.sad,
        }
    }
}

impl From<PostDetails> for PostDto {
    fn from(post: PostDetails) -> Self {
        Self {
            id: post.id,
            content: post.content,
            image_url: post.image_url,
            author: post.author.into(),
            topics: post.topics,
            comments_count: post.comments_count,
            reactions: post.reactions.into(),
            created_at: post.created_at,
        }
    }
}

impl From<FeedPage> for FeedResponseDto {
    fn from(page: FeedPage) -> Self {
        Self {
            posts: page.posts.into_iter().map(PostDto::from).collect(),
            limit: page.limit,
            offset: page.offset,
            total: page.total,
        }
    }
}

impl From<&Topic> for TopicDto {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id.to_string(),
            name: topic.name.to_string(),
        }
    }
}

pub(crate) fn posts_to_dto(posts: Vec<PostDetails>) -> Vec<PostDto> {
    posts.into_iter().map(PostDto::from).collect()
}

fn split_topics(raw: Option<String>) -> Option<Vec<String>> {
    let topics: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect();
    (!topics.is_empty()).then_some(topics)
}

#[utoipa::path(
    get,
    path = "/api/posts",
    tag = "posts",
    params(FeedQuery),
    responses(
        (status = 200, description = "Feed page", body = FeedResponseDto),
        (status = 400, description = "Validation error"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<(StatusCode, Json<FeedResponseDto>)> {
    query.validate()?;

    let page = state
        .post_service
        .feed(query.limit, query.offset, split_topics(query.topics))
        .await?;

    Ok((StatusCode::OK, Json(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/posts/{id}",
    tag = "posts",
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 200, description = "Post found", body = PostDto),
        (status = 404, description = "Post not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<PostDto>)> {
    let post = state.post_service.post_details(id).await?;

    Ok((StatusCode::OK, Json(post.into())))
}

#[utoipa::path(
    get,
    path = "/api/posts/following",
    tag = "posts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Posts of followed users, newest first", body = [PostDto]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn following_feed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<Vec<PostDto>>)> {
    let posts = state.post_service.following_feed(user.user_id).await?;

    Ok((StatusCode::OK, Json(posts_to_dto(posts))))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/posts",
    tag = "posts",
    params(
        ("id" = i64, Path, description = "Author id")
    ),
    responses(
        (status = 200, description = "Posts of the user, newest first", body = [PostDto]),
        (status = 400, description = "Validation error"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn user_posts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<Vec<PostDto>>)> {
    let posts = state.post_service.user_posts(id).await?;

    Ok((StatusCode::OK, Json(posts_to_dto(posts))))
}

#[utoipa::path(
    post,
    path = "/api/posts",
    tag = "posts",
    security(("bearer_auth" = [])),
    request_body = CreatePostDto,
    responses(
        (status = 201, description = "Post created", body = PostDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(dto): Json<CreatePostDto>,
) -> AppResult<(StatusCode, Json<PostDto>)> {
    dto.validate()?;

    let req = CreatePostRequest {
        content: dto.content,
        topics: dto.topics,
        image_url: dto.image_url,
    };

    let post = state.post_service.create_post(user.user_id, req).await?;

    Ok((StatusCode::CREATED, Json(post.into())))
}

#[utoipa::path(
    delete,
    path = "/api/posts/{id}",
    tag = "posts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Post not found"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.post_service.delete_post(user.user_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/topics",
    tag = "posts",
    responses(
        (status = 200, description = "Topic catalog", body = [TopicDto])
    )
)]
pub(crate) async fn list_topics(State(state): State<AppState>) -> Json<Vec<TopicDto>> {
    Json(state.post_service.topics().iter().map(TopicDto::from).collect())
}

#[cfg(test)]
mod tests {
    use super::split_topics;

    #[test]
    fn topic_filter_is_split_on_commas() {
        assert_eq!(
            split_topics(Some(" rust , ,ai".to_string())),
            Some(vec!["rust".to_string(), "ai".to_string()])
        );
    }

    #[test]
    fn blank_topic_filter_means_no_filter() {
        assert_eq!(split_topics(None), None);
        assert_eq!(split_topics(Some(" , ".to_string())), None);
    }
}
