//! In-memory repositories shared by the service tests.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::data::comment_repository::{CommentRepository, NewComment};
use crate::data::follow_repository::FollowRepository;
use crate::data::notification_repository::NotificationRepository;
use crate::data::oauth_state_repository::{NewOAuthState, OAuthStateRepository};
use crate::data::post_repository::{NewPost, Pagination, PostOwnership, PostRepository};
use crate::data::reaction_repository::ReactionRepository;
use crate::data::user_repository::{NewUser, UserCredentials, UserRepository};
use crate::domain::comment::{Comment, ParentComment};
use crate::domain::error::DomainError;
use crate::domain::follow::{Follow, FollowCounts};
use crate::domain::notification::{Audience, Notification, NotificationTemplate};
use crate::domain::post::PostDetails;
use crate::domain::reaction::{ReactionKind, Reactions};
use crate::domain::user::{AuthProvider, AuthorSummary, ExternalProfile, User};
use crate::infrastructure::oauth::{AuthorizationRedirect, OAuthGateway};
use crate::infrastructure::object_storage::{ObjectStorage, StorageError};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: Option<String>,
    provider_id: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    author_id: i64,
    content: String,
    image_url: Option<String>,
    topics: Vec<String>,
    seq: i64,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: i64,
    post_id: i64,
    author_id: i64,
    parent_id: Option<i64>,
    content: String,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: i64,
    users: Vec<StoredUser>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    reactions: Vec<(i64, i64, ReactionKind)>,
    follows: Vec<Follow>,
    notifications: Vec<Notification>,
    oauth_states: Vec<(String, AuthProvider, String, i64)>,
    fail_notifications: bool,
}

impl FakeState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: i64) -> Option<&StoredUser> {
        self.users.iter().find(|stored| stored.user.id == id)
    }

    fn summary(&self, id: i64) -> Result<AuthorSummary, DomainError> {
        self.user(id)
            .map(|stored| stored.user.summary())
            .ok_or_else(|| DomainError::NotFound("user".to_string()))
    }

    fn details(&self, post: &StoredPost) -> Result<PostDetails, DomainError> {
        let mut reactions = Reactions::default();
        for (_, user_id, kind) in self.reactions.iter().filter(|(id, _, _)| *id == post.id) {
            match kind {
                ReactionKind::Happy => reactions.happy.push(*user_id),
                ReactionKind::Sad => reactions.sad.push(*user_id),
            }
        }
        let comments_count = self
            .comments
            .iter()
            .filter(|comment| comment.post_id == post.id)
            .count() as i64;
        PostDetails::new(
            post.id,
            post.content.clone(),
            post.image_url.clone(),
            self.summary(post.author_id)?,
            post.topics.clone(),
            comments_count,
            reactions,
            Utc::now() + Duration::seconds(post.seq),
        )
    }

    fn newest_first(&self, filter: impl Fn(&StoredPost) -> bool) -> Vec<StoredPost> {
        let mut posts: Vec<StoredPost> = self.posts.iter().filter(|p| filter(p)).cloned().collect();
        posts.sort_by(|a, b| b.seq.cmp(&a.seq));
        posts
    }

    fn comment(&self, stored: &StoredComment) -> Result<Comment, DomainError> {
        Comment::new(
            stored.id,
            stored.post_id,
            self.summary(stored.author_id)?,
            stored.parent_id,
            stored.content.clone(),
            Utc::now(),
        )
    }
}

/// One shared in-memory database implementing every repository trait.
#[derive(Clone, Default)]
pub(crate) struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

impl FakeStore {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake store mutex poisoned")
    }

    pub(crate) fn seed_user(&self, username: &str) -> User {
        let mut state = self.lock();
        let id = state.next_id();
        let user = User::new(
            id,
            Some(username.to_string()),
            None,
            format!("{username}@example.com"),
            None,
            AuthProvider::Password,
            true,
            Utc::now(),
        )
        .expect("seed user must be valid");
        state.users.push(StoredUser {
            user: user.clone(),
            password_hash: None,
            provider_id: None,
        });
        user
    }

    pub(crate) fn set_password_hash(&self, user_id: i64, hash: String) {
        let mut state = self.lock();
        if let Some(stored) = state.users.iter_mut().find(|s| s.user.id == user_id) {
            stored.password_hash = Some(hash);
        }
    }

    pub(crate) fn seed_follow(&self, follower_id: i64, following_id: i64) {
        let mut state = self.lock();
        let id = state.next_id();
        let follow = Follow::new(id, follower_id, following_id, Utc::now()).expect("valid follow");
        state.follows.push(follow);
    }

    pub(crate) fn fail_notifications(&self) {
        self.lock().fail_notifications = true;
    }

    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub(crate) fn notifications_for(&self, recipient_id: i64) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.recipient_id == recipient_id)
            .collect()
    }

    pub(crate) fn post_exists(&self, post_id: i64) -> bool {
        self.lock().posts.iter().any(|post| post.id == post_id)
    }

    pub(crate) fn oauth_state_count(&self) -> usize {
        self.lock().oauth_states.len()
    }
}

#[async_trait]
impl UserRepository for FakeStore {
    async fn create_user(&self, input: NewUser) -> Result<User, DomainError> {
        let mut state = self.lock();
        if state
            .users
            .iter()
            .any(|s| username_matches(&s.user, &input.username))
        {
            return Err(DomainError::AlreadyExists("username".to_string()));
        }
        let id = state.next_id();
        let user = User::new(
            id,
            Some(input.username),
            None,
            input.email,
            None,
            AuthProvider::Password,
            true,
            Utc::now(),
        )?;
        state.users.push(StoredUser {
            user: user.clone(),
            password_hash: Some(input.password_hash),
            provider_id: None,
        });
        Ok(user)
    }

    async fn upsert_oauth_profile(&self, profile: ExternalProfile) -> Result<User, DomainError> {
        let mut state = self.lock();
        if let Some(stored) = state.users.iter_mut().find(|s| {
            s.user.provider == profile.provider
                && s.provider_id.as_deref() == Some(profile.provider_id.as_str())
        }) {
            stored.user.email = profile.email;
            stored.user.full_name = profile.full_name;
            stored.user.avatar_url = profile.avatar_url;
            return Ok(stored.user.clone());
        }
        let id = state.next_id();
        let user = User::new(
            id,
            None,
            profile.full_name,
            profile.email,
            profile.avatar_url,
            profile.provider,
            false,
            Utc::now(),
        )?;
        state.users.push(StoredUser {
            user: user.clone(),
            password_hash: None,
            provider_id: Some(profile.provider_id),
        });
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, DomainError> {
        Ok(self.lock().user(id).map(|stored| stored.user.clone()))
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DomainError> {
        let state = self.lock();
        Ok(state
            .users
            .iter()
            .find(|s| s.user.username.as_deref() == Some(username))
            .and_then(|s| {
                s.password_hash.clone().map(|password_hash| UserCredentials {
                    user: s.user.clone(),
                    password_hash,
                })
            }))
    }

    async fn find_profile(&self, username: &str) -> Result<Option<User>, DomainError> {
        let state = self.lock();
        Ok(state
            .users
            .iter()
            .find(|s| s.user.username.as_deref() == Some(username))
            .map(|s| s.user.clone()))
    }

    async fn set_username(&self, user_id: i64, username: &str) -> Result<Option<User>, DomainError> {
        let mut state = self.lock();
        if state
            .users
            .iter()
            .any(|s| s.user.id != user_id && username_matches(&s.user, username))
        {
            return Err(DomainError::AlreadyExists("username".to_string()));
        }
        Ok(state
            .users
            .iter_mut()
            .find(|s| s.user.id == user_id)
            .map(|stored| {
                stored.user.username = Some(username.to_string());
                stored.user.username_set = true;
                stored.user.clone()
            }))
    }
}

#[async_trait]
impl OAuthStateRepository for FakeStore {
    async fn save_state(&self, input: NewOAuthState) -> Result<(), DomainError> {
        self.lock().oauth_states.push((
            input.state,
            input.provider,
            input.pkce_verifier,
            input.ttl_seconds,
        ));
        Ok(())
    }

    async fn consume_state(
        &self,
        state: &str,
        provider: AuthProvider,
    ) -> Result<Option<String>, DomainError> {
        let mut guard = self.lock();
        let Some(idx) = guard
            .oauth_states
            .iter()
            .position(|(saved, saved_provider, _, ttl)| {
                saved == state && *saved_provider == provider && *ttl > 0
            })
        else {
            return Ok(None);
        };
        Ok(Some(guard.oauth_states.remove(idx).2))
    }
}

#[async_trait]
impl PostRepository for FakeStore {
    async fn create_post(&self, input: NewPost) -> Result<PostDetails, DomainError> {
        let mut state = self.lock();
        state.summary(input.author_id)?;
        let id = state.next_id();
        let post = StoredPost {
            id,
            author_id: input.author_id,
            content: input.content,
            image_url: input.image_url,
            topics: input.topics,
            seq: id,
        };
        state.posts.push(post.clone());
        state.details(&post)
    }

    async fn get_post_details(&self, id: i64) -> Result<Option<PostDetails>, DomainError> {
        let state = self.lock();
        state
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| state.details(post))
            .transpose()
    }

    async fn get_ownership(&self, id: i64) -> Result<Option<PostOwnership>, DomainError> {
        Ok(self
            .lock()
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| PostOwnership {
                id: post.id,
                author_id: post.author_id,
                image_url: post.image_url.clone(),
            }))
    }

    async fn delete_post(&self, id: i64) -> Result<bool, DomainError> {
        let mut state = self.lock();
        let before = state.posts.len();
        state.posts.retain(|post| post.id != id);
        state.comments.retain(|comment| comment.post_id != id);
        state.reactions.retain(|(post_id, _, _)| *post_id != id);
        Ok(state.posts.len() < before)
    }

    async fn list_feed(
        &self,
        pagination: Pagination,
        topics: Option<Vec<String>>,
    ) -> Result<Vec<PostDetails>, DomainError> {
        let state = self.lock();
        state
            .newest_first(|post| matches_topics(post, topics.as_deref()))
            .iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .map(|post| state.details(post))
            .collect()
    }

    async fn total_posts(&self, topics: Option<Vec<String>>) -> Result<i64, DomainError> {
        let state = self.lock();
        Ok(state
            .posts
            .iter()
            .filter(|post| matches_topics(post, topics.as_deref()))
            .count() as i64)
    }

    async fn list_by_author(&self, author_id: i64) -> Result<Vec<PostDetails>, DomainError> {
        let state = self.lock();
        state
            .newest_first(|post| post.author_id == author_id)
            .iter()
            .map(|post| state.details(post))
            .collect()
    }

    async fn list_following(&self, follower_id: i64) -> Result<Vec<PostDetails>, DomainError> {
        let state = self.lock();
        let followed: Vec<i64> = state
            .follows
            .iter()
            .filter(|follow| follow.follower_id == follower_id)
            .map(|follow| follow.following_id)
            .collect();
        state
            .newest_first(|post| followed.contains(&post.author_id))
            .iter()
            .map(|post| state.details(post))
            .collect()
    }
}

// Mirrors the unique index on lower(username).
fn username_matches(user: &User, username: &str) -> bool {
    user.username
        .as_deref()
        .is_some_and(|taken| taken.eq_ignore_ascii_case(username))
}

fn matches_topics(post: &StoredPost, topics: Option<&[String]>) -> bool {
    match topics {
        Some(topics) => post.topics.iter().any(|topic| topics.contains(topic)),
        None => true,
    }
}

#[async_trait]
impl CommentRepository for FakeStore {
    async fn create_comment(&self, input: NewComment) -> Result<Comment, DomainError> {
        let mut state = self.lock();
        if !state.posts.iter().any(|post| post.id == input.post_id) {
            return Err(DomainError::NotFound("post".to_string()));
        }
        let id = state.next_id();
        let stored = StoredComment {
            id,
            post_id: input.post_id,
            author_id: input.author_id,
            parent_id: input.parent_id,
            content: input.content,
        };
        state.comments.push(stored.clone());
        state.comment(&stored)
    }

    async fn find_parent(&self, comment_id: i64) -> Result<Option<ParentComment>, DomainError> {
        let state = self.lock();
        let Some(target) = state.comments.iter().find(|c| c.id == comment_id) else {
            return Ok(None);
        };
        let mut depth = 0;
        let mut cursor = target.parent_id;
        while let Some(parent_id) = cursor {
            depth += 1;
            cursor = state
                .comments
                .iter()
                .find(|c| c.id == parent_id)
                .and_then(|c| c.parent_id);
        }
        Ok(Some(ParentComment {
            id: target.id,
            post_id: target.post_id,
            author_id: target.author_id,
            depth,
        }))
    }

    async fn list_for_posts(&self, post_ids: &[i64]) -> Result<Vec<Comment>, DomainError> {
        let state = self.lock();
        state
            .comments
            .iter()
            .filter(|comment| post_ids.contains(&comment.post_id))
            .map(|comment| state.comment(comment))
            .collect()
    }
}

#[async_trait]
impl ReactionRepository for FakeStore {
    async fn current_reaction(
        &self,
        post_id: i64,
        user_id: i64,
    ) -> Result<Option<ReactionKind>, DomainError> {
        Ok(self
            .lock()
            .reactions
            .iter()
            .find(|(p, u, _)| *p == post_id && *u == user_id)
            .map(|(_, _, kind)| *kind))
    }

    async fn upsert_reaction(
        &self,
        post_id: i64,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<(), DomainError> {
        let mut state = self.lock();
        state
            .reactions
            .retain(|(p, u, _)| !(*p == post_id && *u == user_id));
        state.reactions.push((post_id, user_id, kind));
        Ok(())
    }

    async fn delete_reaction(&self, post_id: i64, user_id: i64) -> Result<bool, DomainError> {
        let mut state = self.lock();
        let before = state.reactions.len();
        state
            .reactions
            .retain(|(p, u, _)| !(*p == post_id && *u == user_id));
        Ok(state.reactions.len() < before)
    }

    async fn reactions_for_post(&self, post_id: i64) -> Result<Reactions, DomainError> {
        let mut reactions = Reactions::default();
        for (_, user_id, kind) in self.lock().reactions.iter().filter(|(p, _, _)| *p == post_id) {
            match kind {
                ReactionKind::Happy => reactions.happy.push(*user_id),
                ReactionKind::Sad => reactions.sad.push(*user_id),
            }
        }
        Ok(reactions)
    }
}

#[async_trait]
impl FollowRepository for FakeStore {
    async fn create_follow(&self, follower_id: i64, following_id: i64) -> Result<Follow, DomainError> {
        let mut state = self.lock();
        if state
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id)
        {
            return Err(DomainError::AlreadyExists("follow".to_string()));
        }
        let id = state.next_id();
        let follow = Follow::new(id, follower_id, following_id, Utc::now())?;
        state.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follow(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError> {
        let mut state = self.lock();
        let before = state.follows.len();
        state
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(state.follows.len() < before)
    }

    async fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool, DomainError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id))
    }

    async fn counts(&self, user_id: i64) -> Result<FollowCounts, DomainError> {
        let state = self.lock();
        Ok(FollowCounts {
            followers: state.follows.iter().filter(|f| f.following_id == user_id).count() as i64,
            following: state.follows.iter().filter(|f| f.follower_id == user_id).count() as i64,
        })
    }

    async fn followed_users(&self, follower_id: i64) -> Result<Vec<AuthorSummary>, DomainError> {
        let state = self.lock();
        state
            .follows
            .iter()
            .filter(|f| f.follower_id == follower_id)
            .map(|f| state.summary(f.following_id))
            .collect()
    }
}

#[async_trait]
impl NotificationRepository for FakeStore {
    async fn create_for(
        &self,
        audience: Audience,
        template: NotificationTemplate,
    ) -> Result<Vec<Notification>, DomainError> {
        let mut state = self.lock();
        if state.fail_notifications {
            return Err(DomainError::Unexpected("notification store offline".to_string()));
        }
        let mut recipients: Vec<i64> = match audience {
            Audience::Users(ids) => ids
                .into_iter()
                .filter(|id| state.user(*id).is_some())
                .collect(),
            Audience::FollowersOf(user_id) => state
                .follows
                .iter()
                .filter(|f| f.following_id == user_id)
                .map(|f| f.follower_id)
                .collect(),
            Audience::Usernames(names) => state
                .users
                .iter()
                .filter(|s| {
                    s.user
                        .username
                        .as_ref()
                        .is_some_and(|username| {
                            names.iter().any(|name| name.eq_ignore_ascii_case(username))
                        })
                })
                .map(|s| s.user.id)
                .collect(),
        };
        recipients.sort_unstable();
        recipients.dedup();
        recipients.retain(|id| *id != template.actor_id);

        let actor = state.summary(template.actor_id)?;
        let mut created = Vec::with_capacity(recipients.len());
        for recipient_id in recipients {
            let id = state.next_id();
            let notification = Notification::new(
                id,
                recipient_id,
                template.kind,
                template.title.clone(),
                template.message.clone(),
                false,
                template.related_post_id,
                template.related_comment_id,
                actor.clone(),
                Utc::now(),
            )?;
            state.notifications.push(notification.clone());
            created.push(notification);
        }
        Ok(created)
    }

    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>, DomainError> {
        let state = self.lock();
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.recipient_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, DomainError> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, user_id: i64, ids: &[i64]) -> Result<u64, DomainError> {
        let mut updated = 0;
        for notification in self.lock().notifications.iter_mut() {
            if notification.recipient_id == user_id
                && ids.contains(&notification.id)
                && !notification.is_read
            {
                notification.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, DomainError> {
        let mut updated = 0;
        for notification in self.lock().notifications.iter_mut() {
            if notification.recipient_id == user_id && !notification.is_read {
                notification.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeStorage {
    objects: Arc<Mutex<Vec<String>>>,
    fail_deletes: bool,
}

impl FakeStorage {
    pub(crate) fn failing_deletes() -> Self {
        Self {
            objects: Arc::default(),
            fail_deletes: true,
        }
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.objects.lock().expect("storage mutex poisoned").clone()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put(&self, key: &str, _bytes: &[u8]) -> Result<(), StorageError> {
        self.objects
            .lock()
            .expect("storage mutex poisoned")
            .push(key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        if self.fail_deletes {
            return Err(StorageError::Io(std::io::Error::other("disk unavailable")));
        }
        let mut objects = self.objects.lock().expect("storage mutex poisoned");
        let before = objects.len();
        objects.retain(|stored| stored != key);
        Ok(objects.len() < before)
    }
}

/// Pretends every code exchange succeeds with a fixed provider profile.
pub(crate) struct FakeOAuthGateway {
    pub(crate) profile: ExternalProfile,
}

#[async_trait]
impl OAuthGateway for FakeOAuthGateway {
    fn authorize(&self, provider: AuthProvider) -> Result<AuthorizationRedirect, DomainError> {
        if !provider.is_oauth() {
            return Err(DomainError::Unsupported(provider.to_string()));
        }
        Ok(AuthorizationRedirect {
            url: format!("https://{provider}.example/authorize?state=fixed-state"),
            state: "fixed-state".to_string(),
            pkce_verifier: "fixed-verifier".to_string(),
        })
    }

    async fn fetch_profile(
        &self,
        provider: AuthProvider,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ExternalProfile, DomainError> {
        if code != "good-code" || pkce_verifier != "fixed-verifier" {
            return Err(DomainError::InvalidCredentials);
        }
        Ok(ExternalProfile {
            provider,
            ..self.profile.clone()
        })
    }
}
