use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::models::{
    Author, AuthResponse, AuthorizeUrl, Comment, FeedPage, Follow, FollowCounts, FollowStatus,
    MarkedRead, Notification, Post, Profile, ReactionKind, Reactions, Topic, UnreadCount,
    UploadedImage, User,
};

/// Page size of the infinite feed.
pub const FEED_PAGE_SIZE: u32 = 20;

#[derive(Debug, Serialize)]
struct RegisterRequestDto<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct LoginRequestDto<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SetUsernameRequestDto<'a> {
    username: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePostRequestDto<'a> {
    content: &'a str,
    topics: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateCommentRequestDto<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ToggleReactionRequestDto {
    kind: ReactionKind,
}

#[derive(Debug, Serialize)]
struct MarkReadRequestDto<'a> {
    ids: &'a [i64],
}

#[derive(Debug, Serialize)]
struct DeleteImageRequestDto<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct FeedQuery {
    limit: u32,
    offset: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    topics: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommentsQuery {
    post_ids: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    error: Option<String>,
}

/// Thin REST client: one method per API endpoint, no caching.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    client: Client,
}

impl HttpClient {
    /// Creates a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Base URL of the server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let request = self.client.request(method, self.endpoint(path));
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode_error(response: reqwest::Response) -> ClientError {
        let status = response.status();

        let message = match response.json::<ErrorResponseDto>().await {
            Ok(body) => body.error,
            Err(_) => None,
        };
        ClientError::from_http_status(status, message)
    }

    async fn execute(request: RequestBuilder) -> ClientResult<reqwest::Response> {
        let response = request.send().await.map_err(ClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }
        Ok(response)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> ClientResult<T> {
        Self::execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(ClientError::from_reqwest)
    }

    async fn send_empty(request: RequestBuilder) -> ClientResult<()> {
        Self::execute(request).await.map(|_| ())
    }

    /// Creates a password account.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<AuthResponse> {
        let payload = RegisterRequestDto {
            username,
            email,
            password,
        };
        Self::send(self.request(Method::POST, "/api/auth/register", None).json(&payload)).await
    }

    /// Signs in with username and password.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<AuthResponse> {
        let payload = LoginRequestDto { username, password };
        Self::send(self.request(Method::POST, "/api/auth/login", None).json(&payload)).await
    }

    /// URL of the provider consent page (`github` or `google`).
    pub async fn oauth_authorize_url(&self, provider: &str) -> ClientResult<String> {
        let path = format!("/api/auth/oauth/{provider}/authorize");
        let dto: AuthorizeUrl = Self::send(self.request(Method::GET, &path, None)).await?;
        Ok(dto.authorize_url)
    }

    /// Completes an OAuth sign-in with the code and state the provider redirected with.
    pub async fn oauth_callback(
        &self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> ClientResult<AuthResponse> {
        let path = format!("/api/auth/oauth/{provider}/callback");
        let request = self
            .request(Method::GET, &path, None)
            .query(&[("code", code), ("state", state)]);
        Self::send(request).await
    }

    /// Account of the token owner.
    pub async fn me(&self, token: &str) -> ClientResult<User> {
        Self::send(self.request(Method::GET, "/api/auth/me", Some(token))).await
    }

    /// Picks a username; returns a fresh token carrying it.
    pub async fn set_username(&self, token: &str, username: &str) -> ClientResult<AuthResponse> {
        let payload = SetUsernameRequestDto { username };
        let request = self
            .request(Method::PUT, "/api/auth/me/username", Some(token))
            .json(&payload);
        Self::send(request).await
    }

    /// One page of the global feed, optionally filtered by topics.
    pub async fn feed(&self, limit: u32, offset: u32, topics: &[String]) -> ClientResult<FeedPage> {
        let query = FeedQuery {
            limit,
            offset,
            topics: (!topics.is_empty()).then(|| topics.join(",")),
        };
        Self::send(self.request(Method::GET, "/api/posts", None).query(&query)).await
    }

    /// Single post.
    pub async fn get_post(&self, id: i64) -> ClientResult<Post> {
        Self::send(self.request(Method::GET, &format!("/api/posts/{id}"), None)).await
    }

    /// Posts of users the token owner follows.
    pub async fn following_feed(&self, token: &str) -> ClientResult<Vec<Post>> {
        Self::send(self.request(Method::GET, "/api/posts/following", Some(token))).await
    }

    /// Posts of one author.
    pub async fn user_posts(&self, user_id: i64) -> ClientResult<Vec<Post>> {
        Self::send(self.request(Method::GET, &format!("/api/users/{user_id}/posts"), None)).await
    }

    /// Publishes a post.
    pub async fn create_post(
        &self,
        token: &str,
        content: &str,
        topics: &[String],
        image_url: Option<&str>,
    ) -> ClientResult<Post> {
        let payload = CreatePostRequestDto {
            content,
            topics,
            image_url,
        };
        Self::send(self.request(Method::POST, "/api/posts", Some(token)).json(&payload)).await
    }

    /// Deletes an own post.
    pub async fn delete_post(&self, token: &str, id: i64) -> ClientResult<()> {
        Self::send_empty(self.request(Method::DELETE, &format!("/api/posts/{id}"), Some(token)))
            .await
    }

    /// Topic catalog.
    pub async fn topics(&self) -> ClientResult<Vec<Topic>> {
        Self::send(self.request(Method::GET, "/api/topics", None)).await
    }

    /// Flat comments of the given posts, oldest first.
    pub async fn comments(&self, post_ids: &[i64]) -> ClientResult<Vec<Comment>> {
        let query = CommentsQuery {
            post_ids: post_ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(","),
        };
        Self::send(self.request(Method::GET, "/api/comments", None).query(&query)).await
    }

    /// Comments on a post, or replies to `parent_id`.
    pub async fn create_comment(
        &self,
        token: &str,
        post_id: i64,
        content: &str,
        parent_id: Option<i64>,
    ) -> ClientResult<Comment> {
        let payload = CreateCommentRequestDto { content, parent_id };
        let path = format!("/api/posts/{post_id}/comments");
        Self::send(self.request(Method::POST, &path, Some(token)).json(&payload)).await
    }

    /// Toggles a reaction and returns the post's updated reactions.
    pub async fn toggle_reaction(
        &self,
        token: &str,
        post_id: i64,
        kind: ReactionKind,
    ) -> ClientResult<Reactions> {
        let payload = ToggleReactionRequestDto { kind };
        let path = format!("/api/posts/{post_id}/reactions");
        Self::send(self.request(Method::POST, &path, Some(token)).json(&payload)).await
    }

    /// Public profile by username.
    pub async fn profile(&self, username: &str) -> ClientResult<Profile> {
        Self::send(self.request(Method::GET, &format!("/api/profiles/{username}"), None)).await
    }

    /// Public profile by id.
    pub async fn user(&self, user_id: i64) -> ClientResult<Profile> {
        Self::send(self.request(Method::GET, &format!("/api/users/{user_id}"), None)).await
    }

    /// Follower and following counts.
    pub async fn follow_counts(&self, user_id: i64) -> ClientResult<FollowCounts> {
        let path = format!("/api/users/{user_id}/follow-counts");
        Self::send(self.request(Method::GET, &path, None)).await
    }

    /// Users `user_id` follows, latest follow first.
    pub async fn followed_users(&self, user_id: i64) -> ClientResult<Vec<Author>> {
        let path = format!("/api/users/{user_id}/following");
        Self::send(self.request(Method::GET, &path, None)).await
    }

    /// Whether the token owner follows `user_id`.
    pub async fn follow_status(&self, token: &str, user_id: i64) -> ClientResult<bool> {
        let path = format!("/api/users/{user_id}/follow");
        let dto: FollowStatus = Self::send(self.request(Method::GET, &path, Some(token))).await?;
        Ok(dto.following)
    }

    /// Follows `user_id`.
    pub async fn follow(&self, token: &str, user_id: i64) -> ClientResult<Follow> {
        let path = format!("/api/users/{user_id}/follow");
        Self::send(self.request(Method::POST, &path, Some(token))).await
    }

    /// Unfollows `user_id`.
    pub async fn unfollow(&self, token: &str, user_id: i64) -> ClientResult<()> {
        let path = format!("/api/users/{user_id}/follow");
        Self::send_empty(self.request(Method::DELETE, &path, Some(token))).await
    }

    /// Latest notifications of the token owner.
    pub async fn notifications(&self, token: &str) -> ClientResult<Vec<Notification>> {
        Self::send(self.request(Method::GET, "/api/notifications", Some(token))).await
    }

    /// Number of unread notifications.
    pub async fn unread_count(&self, token: &str) -> ClientResult<i64> {
        let request = self.request(Method::GET, "/api/notifications/unread-count", Some(token));
        let dto: UnreadCount = Self::send(request).await?;
        Ok(dto.unread)
    }

    /// Marks the given notifications as read; returns how many changed.
    pub async fn mark_read(&self, token: &str, ids: &[i64]) -> ClientResult<u64> {
        let payload = MarkReadRequestDto { ids };
        let request = self
            .request(Method::POST, "/api/notifications/read", Some(token))
            .json(&payload);
        let dto: MarkedRead = Self::send(request).await?;
        Ok(dto.updated)
    }

    /// Marks every notification as read.
    pub async fn mark_all_read(&self, token: &str) -> ClientResult<u64> {
        let request = self.request(Method::POST, "/api/notifications/read-all", Some(token));
        let dto: MarkedRead = Self::send(request).await?;
        Ok(dto.updated)
    }

    /// Uploads raw image bytes; returns the public URL.
    pub async fn upload_image(
        &self,
        token: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<String> {
        let request = self
            .request(Method::POST, "/api/media/images", Some(token))
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes);
        let dto: UploadedImage = Self::send(request).await?;
        Ok(dto.url)
    }

    /// Deletes a previously uploaded image.
    pub async fn delete_image(&self, token: &str, url: &str) -> ClientResult<()> {
        let payload = DeleteImageRequestDto { url };
        let request = self
            .request(Method::DELETE, "/api/media/images", Some(token))
            .json(&payload);
        Self::send_empty(request).await
    }
}
