//! Client library for the DevConnect server.
//!
//! [`DevConnectClient`] wraps the REST API (`reqwest`) and the notification
//! gRPC service (`tonic`) behind a query cache: reads are served from the
//! cache while fresh, mutations invalidate the queries they affect, and
//! reactions are applied optimistically with rollback on failure.
//!
//! The client keeps the JWT after `register`/`login` and uses it for
//! protected operations.
#![warn(missing_docs)]

pub mod cache;
mod error;
mod grpc_client;
mod http_client;
mod models;
mod mutation;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::mutation::{Mutation, reaction_keys};

pub use cache::{QueryCache, QueryKey, QueryOptions, RetryPolicy, keys};
pub use error::{ClientError, ClientResult};
pub use grpc_client::GrpcClient;
pub use http_client::{FEED_PAGE_SIZE, HttpClient};
pub use models::{
    AuthResponse, Author, Comment, CommentNode, FeedPage, Follow, FollowCounts, Notification,
    Post, Profile, ReactionKind, Reactions, Topic, User, build_comment_tree,
};

/// Image attached to a new post.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// MIME type, must start with `image/`.
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Offset of the next page of the infinite feed, or `None` once a page came
/// back short.
pub fn next_page_offset(pages: &[FeedPage]) -> Option<u32> {
    match pages.last() {
        None => Some(0),
        Some(last) if last.posts.len() == FEED_PAGE_SIZE as usize => {
            u32::try_from(pages.len()).ok()?.checked_mul(FEED_PAGE_SIZE)
        }
        Some(_) => None,
    }
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    user_id: i64,
}

/// Cached, session-aware client of the DevConnect API.
#[derive(Debug, Clone)]
pub struct DevConnectClient {
    http: HttpClient,
    grpc: Option<GrpcClient>,
    session: Option<Session>,
    cache: Arc<QueryCache>,
}

impl DevConnectClient {
    /// Creates a client for the HTTP API at `base_url`.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(base_url)?,
            grpc: None,
            session: None,
            cache: Arc::new(QueryCache::default()),
        })
    }

    /// Enables the notification gRPC service at `endpoint`. The inbox is then
    /// read over gRPC and [`watch_notifications`](Self::watch_notifications) works.
    pub fn with_grpc(mut self, endpoint: impl Into<String>) -> Self {
        self.grpc = Some(GrpcClient::new(endpoint));
        self
    }

    /// The underlying query cache.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Current JWT, if signed in.
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.token.as_str())
    }

    /// Id of the signed-in user.
    pub fn current_user_id(&self) -> Option<i64> {
        self.session.as_ref().map(|session| session.user_id)
    }

    fn session(&self) -> ClientResult<(&str, i64)> {
        self.session
            .as_ref()
            .map(|session| (session.token.as_str(), session.user_id))
            .ok_or(ClientError::Unauthorized)
    }

    fn start_session(&mut self, auth: &AuthResponse) {
        if self.current_user_id() != Some(auth.user.id) {
            self.cache.clear();
        }
        self.session = Some(Session {
            token: auth.access_token.clone(),
            user_id: auth.user.id,
        });
    }

    /// Restores a session from a saved token; fails if the token is rejected.
    pub async fn resume(&mut self, token: &str) -> ClientResult<User> {
        let user = self.http.me(token).await?;
        self.start_session(&AuthResponse {
            access_token: token.to_string(),
            user: user.clone(),
        });
        Ok(user)
    }

    /// Creates a password account and signs in.
    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<AuthResponse> {
        let auth = self.http.register(username, email, password).await?;
        self.start_session(&auth);
        Ok(auth)
    }

    /// Signs in with username and password.
    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<AuthResponse> {
        let auth = self.http.login(username, password).await?;
        self.start_session(&auth);
        Ok(auth)
    }

    /// URL of the provider consent page (`github` or `google`).
    pub async fn oauth_authorize_url(&self, provider: &str) -> ClientResult<String> {
        self.http.oauth_authorize_url(provider).await
    }

    /// Finishes an OAuth sign-in and starts the session.
    pub async fn complete_oauth(
        &mut self,
        provider: &str,
        code: &str,
        state: &str,
    ) -> ClientResult<AuthResponse> {
        let auth = self.http.oauth_callback(provider, code, state).await?;
        self.start_session(&auth);
        Ok(auth)
    }

    /// Picks a username for the signed-in account and switches to the new token.
    pub async fn set_username(&mut self, username: &str) -> ClientResult<AuthResponse> {
        let (token, _) = self.session()?;
        let auth = self.http.set_username(token, username).await?;
        self.start_session(&auth);
        self.cache.invalidate(&QueryKey::new(["profile"]));
        Ok(auth)
    }

    /// Account of the signed-in user, straight from the server.
    pub async fn me(&self) -> ClientResult<User> {
        let (token, _) = self.session()?;
        self.http.me(token).await
    }

    /// Drops the token and everything cached for it.
    pub fn sign_out(&mut self) {
        self.session = None;
        self.cache.clear();
        debug!("signed out, cache cleared");
    }

    /// Drops cache entries unused for longer than their gc time.
    pub fn gc(&self) -> usize {
        self.cache.gc()
    }

    /// First page of the feed, optionally filtered by topics.
    pub async fn feed(&self, topics: &[String]) -> ClientResult<FeedPage> {
        let http = &self.http;
        self.cache
            .fetch(
                &keys::posts_with_topics(topics),
                QueryOptions::DEFAULT,
                move || http.feed(FEED_PAGE_SIZE, 0, topics),
            )
            .await
    }

    /// Pages of the infinite feed loaded so far; loads the first page when
    /// nothing is cached. A stale feed is reloaded page by page.
    pub async fn feed_pages(&self, topics: &[String]) -> ClientResult<Vec<FeedPage>> {
        let key = keys::paginated_posts_with_topics(topics);
        let loaded = self
            .cache
            .get::<Vec<FeedPage>>(&key)
            .map_or(1, |pages| pages.len().max(1));
        let http = &self.http;

        self.cache
            .fetch(&key, QueryOptions::DEFAULT, move || async move {
                let mut pages: Vec<FeedPage> = Vec::with_capacity(loaded);
                while pages.len() < loaded {
                    let Some(offset) = next_page_offset(&pages) else {
                        break;
                    };
                    pages.push(http.feed(FEED_PAGE_SIZE, offset, topics).await?);
                }
                Ok::<_, ClientError>(pages)
            })
            .await
    }

    /// Loads and appends the next feed page. Returns `None` when the feed is exhausted.
    pub async fn fetch_next_page(&self, topics: &[String]) -> ClientResult<Option<FeedPage>> {
        let mut pages = self.feed_pages(topics).await?;
        let Some(offset) = next_page_offset(&pages) else {
            return Ok(None);
        };

        let page = RetryPolicy::QUERY
            .run(|| self.http.feed(FEED_PAGE_SIZE, offset, topics))
            .await?;
        pages.push(page.clone());
        self.cache.set(
            &keys::paginated_posts_with_topics(topics),
            &pages,
            QueryOptions::DEFAULT,
        )?;
        Ok(Some(page))
    }

    /// Whether the infinite feed has more pages to load.
    pub fn has_next_page(&self, topics: &[String]) -> bool {
        self.cache
            .get::<Vec<FeedPage>>(&keys::paginated_posts_with_topics(topics))
            .is_none_or(|pages| next_page_offset(&pages).is_some())
    }

    /// Single post.
    pub async fn post(&self, post_id: i64) -> ClientResult<Post> {
        let http = &self.http;
        self.cache
            .fetch(&keys::post_detail(post_id), QueryOptions::DEFAULT, move || {
                http.get_post(post_id)
            })
            .await
    }

    /// Flat comments of the given posts.
    pub async fn comments(&self, post_ids: &[i64]) -> ClientResult<Vec<Comment>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let http = &self.http;
        self.cache
            .fetch(&keys::comments(post_ids), QueryOptions::DEFAULT, move || {
                http.comments(post_ids)
            })
            .await
    }

    /// Comments of one post arranged as a reply tree.
    pub async fn comment_tree(&self, post_id: i64) -> ClientResult<Vec<CommentNode>> {
        let comments = self.comments(&[post_id]).await?;
        Ok(build_comment_tree(comments))
    }

    /// Public profile by username.
    pub async fn profile(&self, username: &str) -> ClientResult<Profile> {
        let http = &self.http;
        self.cache
            .fetch(&keys::profile(username), QueryOptions::DEFAULT, move || {
                http.profile(username)
            })
            .await
    }

    /// Posts of one author.
    pub async fn user_posts(&self, user_id: i64) -> ClientResult<Vec<Post>> {
        let http = &self.http;
        self.cache
            .fetch(&keys::user_posts(user_id), QueryOptions::DEFAULT, move || {
                http.user_posts(user_id)
            })
            .await
    }

    /// Posts of users the signed-in user follows.
    pub async fn following_posts(&self) -> ClientResult<Vec<Post>> {
        let (token, me) = self.session()?;
        let http = &self.http;
        self.cache
            .fetch(&keys::following_posts(me), QueryOptions::DEFAULT, move || {
                http.following_feed(token)
            })
            .await
    }

    /// Whether the signed-in user follows `user_id`.
    pub async fn follow_status(&self, user_id: i64) -> ClientResult<bool> {
        let (token, me) = self.session()?;
        if me == user_id {
            return Ok(false);
        }
        let http = &self.http;
        self.cache
            .fetch(
                &keys::follow_status(me, user_id),
                QueryOptions::DEFAULT,
                move || http.follow_status(token, user_id),
            )
            .await
    }

    /// Users `user_id` follows.
    pub async fn followed_users(&self, user_id: i64) -> ClientResult<Vec<Author>> {
        let http = &self.http;
        self.cache
            .fetch(&keys::followed_users(user_id), QueryOptions::DEFAULT, move || {
                http.followed_users(user_id)
            })
            .await
    }

    /// Number of users following `user_id`.
    pub async fn follower_count(&self, user_id: i64) -> ClientResult<i64> {
        let http = &self.http;
        self.cache
            .fetch(&keys::follower_count(user_id), QueryOptions::DEFAULT, move || async move {
                Ok::<_, ClientError>(http.follow_counts(user_id).await?.followers)
            })
            .await
    }

    /// Number of users `user_id` follows.
    pub async fn following_count(&self, user_id: i64) -> ClientResult<i64> {
        let http = &self.http;
        self.cache
            .fetch(&keys::following_count(user_id), QueryOptions::DEFAULT, move || async move {
                Ok::<_, ClientError>(http.follow_counts(user_id).await?.following)
            })
            .await
    }

    /// Topic catalog.
    pub async fn topics(&self) -> ClientResult<Vec<Topic>> {
        let http = &self.http;
        self.cache
            .fetch(&keys::topics(), QueryOptions::DEFAULT, move || http.topics())
            .await
    }

    /// Latest notifications of the signed-in user.
    pub async fn notifications(&self) -> ClientResult<Vec<Notification>> {
        let (token, me) = self.session()?;
        let http = &self.http;
        let grpc = self.grpc.as_ref();
        self.cache
            .fetch(&keys::notifications(me), QueryOptions::NOTIFICATIONS, move || async move {
                match grpc {
                    Some(grpc) => grpc.list_notifications(token).await,
                    None => http.notifications(token).await,
                }
            })
            .await
    }

    /// Number of unread notifications of the signed-in user.
    pub async fn unread_count(&self) -> ClientResult<i64> {
        let (token, me) = self.session()?;
        let http = &self.http;
        let grpc = self.grpc.as_ref();
        self.cache
            .fetch(
                &keys::unread_notification_count(me),
                QueryOptions::UNREAD_COUNT,
                move || async move {
                    match grpc {
                        Some(grpc) => grpc.unread_count(token).await,
                        None => http.unread_count(token).await,
                    }
                },
            )
            .await
    }

    /// Publishes a post, uploading `image` first when given.
    pub async fn create_post(
        &self,
        content: &str,
        topics: &[String],
        image: Option<ImageUpload>,
    ) -> ClientResult<Post> {
        let (token, me) = self.session()?;

        let image_url = match image {
            Some(image) => Some(
                self.http
                    .upload_image(token, &image.content_type, image.bytes)
                    .await?,
            ),
            None => None,
        };

        let post = self
            .http
            .create_post(token, content, topics, image_url.as_deref())
            .await?;

        self.invalidate_after(Mutation::CreatePost { author_id: me });
        Ok(post)
    }

    /// Deletes an own post.
    pub async fn delete_post(&self, post_id: i64) -> ClientResult<()> {
        let (token, me) = self.session()?;
        self.http.delete_post(token, post_id).await?;

        self.invalidate_after(Mutation::DeletePost {
            author_id: me,
            post_id,
        });
        Ok(())
    }

    /// Comments on a post, or replies to `parent_id`.
    pub async fn create_comment(
        &self,
        post_id: i64,
        content: &str,
        parent_id: Option<i64>,
    ) -> ClientResult<Comment> {
        let (token, _) = self.session()?;
        let comment = self
            .http
            .create_comment(token, post_id, content, parent_id)
            .await?;

        self.invalidate_after(Mutation::CreateComment { post_id });
        Ok(comment)
    }

    /// Toggles a reaction. Cached feeds and the post entry show the change
    /// immediately and are rolled back if the server rejects it.
    pub async fn toggle_reaction(&self, post_id: i64, kind: ReactionKind) -> ClientResult<Reactions> {
        let (token, me) = self.session()?;
        let snapshots: Vec<_> = reaction_keys(post_id)
            .iter()
            .map(|key| self.cache.snapshot(key))
            .collect();
        apply_reaction(&self.cache, post_id, me, kind)?;

        let result = self.http.toggle_reaction(token, post_id, kind).await;
        if let Err(err) = &result {
            warn!(post_id, error = %err, "reaction rejected, rolling back");
            for snapshot in snapshots {
                self.cache.restore(snapshot);
            }
        }

        self.invalidate_after(Mutation::ToggleReaction { post_id });
        result
    }

    /// Follows `user_id`.
    pub async fn follow(&self, user_id: i64) -> ClientResult<Follow> {
        let (token, me) = self.session()?;
        let follow = self.http.follow(token, user_id).await?;

        self.invalidate_after(Mutation::Follow {
            follower_id: me,
            following_id: user_id,
        });
        Ok(follow)
    }

    /// Unfollows `user_id`.
    pub async fn unfollow(&self, user_id: i64) -> ClientResult<()> {
        let (token, me) = self.session()?;
        self.http.unfollow(token, user_id).await?;

        self.invalidate_after(Mutation::Unfollow {
            follower_id: me,
            following_id: user_id,
        });
        Ok(())
    }

    /// Marks notifications as read; everything when `ids` is empty.
    pub async fn mark_read(&self, ids: &[i64]) -> ClientResult<u64> {
        let (token, _) = self.session()?;
        let updated = match (&self.grpc, ids.is_empty()) {
            (Some(grpc), _) => grpc.mark_read(token, ids).await?,
            (None, true) => self.http.mark_all_read(token).await?,
            (None, false) => self.http.mark_read(token, ids).await?,
        };

        self.invalidate_after(Mutation::MarkRead);
        Ok(updated)
    }

    fn invalidate_after(&self, mutation: Mutation) {
        for prefix in mutation.stale_keys() {
            self.cache.invalidate(&prefix);
        }
    }

    /// Deletes an uploaded image of the signed-in user.
    pub async fn delete_image(&self, url: &str) -> ClientResult<()> {
        let (token, _) = self.session()?;
        self.http.delete_image(token, url).await
    }

    /// Subscribes to real-time notifications. Every delivered notification
    /// invalidates the cached inbox and unread counter.
    pub async fn watch_notifications(
        &self,
    ) -> ClientResult<impl Stream<Item = ClientResult<Notification>> + Send + 'static> {
        let (token, me) = self.session()?;
        let grpc = self.grpc.as_ref().ok_or_else(|| {
            ClientError::InvalidRequest("grpc endpoint is not configured".to_string())
        })?;

        let stream = grpc.subscribe(token).await?;
        let cache = Arc::clone(&self.cache);
        Ok(stream.inspect(move |item| {
            if item.is_ok() {
                cache.invalidate(&keys::notifications(me));
                cache.invalidate(&keys::unread_notification_count(me));
            }
        }))
    }
}

fn apply_reaction(
    cache: &QueryCache,
    post_id: i64,
    user_id: i64,
    kind: ReactionKind,
) -> ClientResult<()> {
    let toggle = |post: &mut Post| {
        if post.id == post_id {
            post.reactions.toggle(user_id, kind);
        }
    };

    cache.update_matching::<FeedPage, _>(&keys::posts(), |page| {
        page.posts.iter_mut().for_each(toggle)
    })?;
    cache.update_matching::<Vec<FeedPage>, _>(&keys::paginated_posts(), |pages| {
        pages
            .iter_mut()
            .flat_map(|page| page.posts.iter_mut())
            .for_each(toggle)
    })?;
    cache.update_matching::<Post, _>(&keys::post_detail(post_id), toggle)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn post(id: i64) -> Post {
        Post {
            id,
            content: format!("post {id}"),
            image_url: None,
            author: Author {
                id: 1,
                username: Some("neo".to_string()),
                full_name: None,
                avatar_url: None,
            },
            topics: vec![],
            comments_count: 0,
            reactions: Reactions::default(),
            created_at: Utc.timestamp_opt(id, 0).single().expect("valid ts"),
        }
    }

    fn page(ids: std::ops::Range<i64>, offset: u32) -> FeedPage {
        FeedPage {
            posts: ids.map(post).collect(),
            limit: FEED_PAGE_SIZE,
            offset,
            total: 100,
        }
    }

    #[test]
    fn next_offset_follows_full_pages() {
        assert_eq!(next_page_offset(&[]), Some(0));
        assert_eq!(next_page_offset(&[page(0..20, 0)]), Some(20));
        assert_eq!(
            next_page_offset(&[page(0..20, 0), page(20..40, 20)]),
            Some(40)
        );
        assert_eq!(next_page_offset(&[page(0..20, 0), page(20..25, 20)]), None);
    }

    #[test]
    fn optimistic_reaction_touches_every_cached_copy() {
        let cache = QueryCache::default();
        cache
            .set(&keys::posts(), &page(1..3, 0), QueryOptions::DEFAULT)
            .expect("set");
        cache
            .set(
                &keys::paginated_posts(),
                &vec![page(1..3, 0)],
                QueryOptions::DEFAULT,
            )
            .expect("set");
        cache
            .set(&keys::post_detail(2), &post(2), QueryOptions::DEFAULT)
            .expect("set");

        apply_reaction(&cache, 2, 9, ReactionKind::Happy).expect("apply");

        let feed = cache.get::<FeedPage>(&keys::posts()).expect("feed");
        assert_eq!(feed.posts[1].reactions.happy, vec![9]);
        assert!(feed.posts[0].reactions.happy.is_empty());

        let pages = cache
            .get::<Vec<FeedPage>>(&keys::paginated_posts())
            .expect("pages");
        assert_eq!(pages[0].posts[1].reactions.happy, vec![9]);

        let detail = cache.get::<Post>(&keys::post_detail(2)).expect("detail");
        assert_eq!(detail.reactions.of(9), Some(ReactionKind::Happy));
    }

    #[test]
    fn rollback_restores_pre_reaction_state() {
        let cache = QueryCache::default();
        cache
            .set(&keys::post_detail(2), &post(2), QueryOptions::DEFAULT)
            .expect("set");

        let snapshot = cache.snapshot(&keys::post_detail(2));
        apply_reaction(&cache, 2, 9, ReactionKind::Sad).expect("apply");
        cache.restore(snapshot);

        let detail = cache.get::<Post>(&keys::post_detail(2)).expect("detail");
        assert_eq!(detail.reactions, Reactions::default());
    }

    #[test]
    fn sign_out_clears_session_and_cache() {
        let mut client = DevConnectClient::new("http://localhost:8080").expect("client");
        client.session = Some(Session {
            token: "jwt".to_string(),
            user_id: 1,
        });
        client
            .cache()
            .set(&keys::notifications(1), &Vec::<Notification>::new(), QueryOptions::NOTIFICATIONS)
            .expect("set");

        client.sign_out();

        assert!(client.token().is_none());
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn rejected_reaction_rolls_back_and_marks_copies_stale() {
        // Nothing listens on the discard port, so the request fails to connect.
        let mut client = DevConnectClient::new("http://127.0.0.1:9").expect("client");
        client.session = Some(Session {
            token: "jwt".to_string(),
            user_id: 9,
        });
        client
            .cache()
            .set(&keys::posts(), &page(1..3, 0), QueryOptions::DEFAULT)
            .expect("set");
        client
            .cache()
            .set(&keys::post_detail(2), &post(2), QueryOptions::DEFAULT)
            .expect("set");
        client
            .cache()
            .set(&keys::topics(), &Vec::<Topic>::new(), QueryOptions::DEFAULT)
            .expect("set");

        let err = client
            .toggle_reaction(2, ReactionKind::Happy)
            .await
            .expect_err("server is unreachable");
        assert!(matches!(err, ClientError::Http(_)));

        let feed = client.cache().get::<FeedPage>(&keys::posts()).expect("feed");
        assert!(feed.posts.iter().all(|p| p.reactions == Reactions::default()));
        let detail = client
            .cache()
            .get::<Post>(&keys::post_detail(2))
            .expect("detail");
        assert_eq!(detail.reactions, Reactions::default());

        assert!(client.cache().is_stale(&keys::posts()));
        assert!(client.cache().is_stale(&keys::post_detail(2)));
        assert!(!client.cache().is_stale(&keys::topics()));
    }

    #[tokio::test]
    async fn protected_queries_require_a_session() {
        let client = DevConnectClient::new("http://localhost:8080").expect("client");

        let err = client.notifications().await.expect_err("must fail");
        assert!(matches!(err, ClientError::Unauthorized));

        let err = client
            .toggle_reaction(1, ReactionKind::Happy)
            .await
            .expect_err("must fail");
        assert!(matches!(err, ClientError::Unauthorized));
    }
}
