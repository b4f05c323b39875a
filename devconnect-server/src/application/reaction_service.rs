use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::notification_service::NotificationService;
use crate::data::notification_repository::NotificationRepository;
use crate::data::post_repository::PostRepository;
use crate::data::reaction_repository::ReactionRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::error::{DomainError, validate_positive_id};
use crate::domain::notification::{Audience, NotificationTemplate};
use crate::domain::reaction::{ReactionChange, ReactionKind, Reactions};

pub(crate) struct ReactionService<R, P, U, N>
where
    R: ReactionRepository,
    P: PostRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    reactions: R,
    posts: P,
    users: U,
    notifications: Arc<NotificationService<N>>,
}

impl<R, P, U, N> ReactionService<R, P, U, N>
where
    R: ReactionRepository,
    P: PostRepository,
    U: UserRepository,
    N: NotificationRepository,
{
    pub(crate) fn new(
        reactions: R,
        posts: P,
        users: U,
        notifications: Arc<NotificationService<N>>,
    ) -> Self {
        Self {
            reactions,
            posts,
            users,
            notifications,
        }
    }

    /// Same kind again removes the reaction, the other kind replaces it.
    /// Returns the post's reactions after the change.
    pub(crate) async fn toggle_reaction(
        &self,
        user_id: i64,
        post_id: i64,
        kind: ReactionKind,
    ) -> Result<Reactions, DomainError> {
        validate_positive_id("user_id", user_id)?;
        validate_positive_id("post_id", post_id)?;
        let post = self
            .posts
            .get_ownership(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post {post_id}")))?;

        let current = self.reactions.current_reaction(post_id, user_id).await?;
        let change = ReactionChange::decide(current, kind);
        match change {
            ReactionChange::Removed(_) => {
                self.reactions.delete_reaction(post_id, user_id).await?;
            }
            ReactionChange::Added(kind) | ReactionChange::Replaced { to: kind, .. } => {
                self.reactions.upsert_reaction(post_id, user_id, kind).await?;
            }
        }
        debug!(post_id, user_id, ?change, "reaction toggled");

        if change.is_addition() && post.author_id != user_id {
            self.notify_author(user_id, post.author_id, post_id, kind).await;
        }

        self.reactions.reactions_for_post(post_id).await
    }

    async fn notify_author(&self, actor_id: i64, author_id: i64, post_id: i64, kind: ReactionKind) {
        let actor = match self.users.find_by_id(actor_id).await {
            Ok(Some(actor)) => actor.summary(),
            Ok(None) => return,
            Err(err) => {
                warn!(actor_id, error = %err, "cannot resolve reaction actor");
                return;
            }
        };
        self.notifications
            .dispatch_or_log(
                Audience::Users(vec![author_id]),
                NotificationTemplate::post_reaction(&actor, post_id, kind),
            )
            .await;
    }
}
