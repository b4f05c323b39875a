use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::data::notification_repository::NotificationRepository;
use crate::domain::error::{DomainError, validate_positive_id};
use crate::domain::notification::{
    Audience, MAX_LISTED_NOTIFICATIONS, Notification, NotificationTemplate,
};
use crate::infrastructure::notification_hub::NotificationHub;

pub(crate) struct NotificationService<N: NotificationRepository> {
    repo: N,
    hub: NotificationHub,
}

impl<N: NotificationRepository> NotificationService<N> {
    pub(crate) fn new(repo: N, hub: NotificationHub) -> Self {
        Self { repo, hub }
    }

    /// Stores the notifications and pushes them to live subscribers.
    pub(crate) async fn dispatch(
        &self,
        audience: Audience,
        template: NotificationTemplate,
    ) -> Result<Vec<Notification>, DomainError> {
        let kind = template.kind;
        let created = self.repo.create_for(audience, template).await?;
        for notification in &created {
            self.hub.publish(notification.clone());
        }
        debug!(%kind, count = created.len(), "notifications dispatched");
        Ok(created)
    }

    /// Notifications are a side effect: a failure here must not fail the action that caused it.
    pub(crate) async fn dispatch_or_log(&self, audience: Audience, template: NotificationTemplate) {
        let kind = template.kind;
        if let Err(err) = self.dispatch(audience, template).await {
            warn!(%kind, error = %err, "failed to dispatch notifications");
        }
    }

    pub(crate) async fn list(&self, user_id: i64) -> Result<Vec<Notification>, DomainError> {
        validate_positive_id("user_id", user_id)?;
        self.repo
            .list_for_user(user_id, MAX_LISTED_NOTIFICATIONS)
            .await
    }

    pub(crate) async fn unread_count(&self, user_id: i64) -> Result<i64, DomainError> {
        validate_positive_id("user_id", user_id)?;
        self.repo.unread_count(user_id).await
    }

    pub(crate) async fn mark_read(&self, user_id: i64, ids: &[i64]) -> Result<u64, DomainError> {
        validate_positive_id("user_id", user_id)?;
        for id in ids {
            validate_positive_id("ids", *id)?;
        }
        self.repo.mark_read(user_id, ids).await
    }

    pub(crate) async fn mark_all_read(&self, user_id: i64) -> Result<u64, DomainError> {
        validate_positive_id("user_id", user_id)?;
        self.repo.mark_all_read(user_id).await
    }

    /// Raw feed of every new notification; callers filter by recipient.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.hub.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::NotificationService;
    use crate::application::fakes::FakeStore;
    use crate::domain::notification::{Audience, NotificationKind, NotificationTemplate};
    use crate::infrastructure::notification_hub::NotificationHub;

    fn service(store: &FakeStore) -> NotificationService<FakeStore> {
        NotificationService::new(store.clone(), NotificationHub::new(16))
    }

    #[tokio::test]
    async fn dispatch_skips_actor_and_publishes_to_hub() {
        let store = FakeStore::default();
        let actor = store.seed_user("actor");
        let reader = store.seed_user("reader");
        let service = service(&store);
        let mut rx = service.subscribe();

        let created = service
            .dispatch(
                Audience::Users(vec![actor.id, reader.id]),
                NotificationTemplate::follow(&actor.summary()),
            )
            .await
            .expect("dispatch must succeed");

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recipient_id, reader.id);
        let live = rx.recv().await.expect("published");
        assert_eq!(live.kind, NotificationKind::Follow);
        assert_eq!(live.recipient_id, reader.id);
    }

    #[tokio::test]
    async fn dispatch_or_log_swallows_failures() {
        let store = FakeStore::default();
        let actor = store.seed_user("actor");
        let reader = store.seed_user("reader");
        store.fail_notifications();

        service(&store)
            .dispatch_or_log(
                Audience::Users(vec![reader.id]),
                NotificationTemplate::follow(&actor.summary()),
            )
            .await;

        assert!(store.notifications().is_empty());
    }

    #[tokio::test]
    async fn mark_read_touches_only_own_notifications() {
        let store = FakeStore::default();
        let actor = store.seed_user("actor");
        let alice = store.seed_user("alice");
        let bob = store.seed_user("bob");
        let service = service(&store);

        let created = service
            .dispatch(
                Audience::Users(vec![alice.id, bob.id]),
                NotificationTemplate::follow(&actor.summary()),
            )
            .await
            .expect("dispatch");
        let ids: Vec<i64> = created.iter().map(|n| n.id).collect();

        let updated = service.mark_read(alice.id, &ids).await.expect("mark read");
        assert_eq!(updated, 1);
        assert_eq!(service.unread_count(alice.id).await.expect("count"), 0);
        assert_eq!(service.unread_count(bob.id).await.expect("count"), 1);

        assert_eq!(service.mark_all_read(bob.id).await.expect("mark all"), 1);
        assert_eq!(service.unread_count(bob.id).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let store = FakeStore::default();
        let actor = store.seed_user("actor");
        let reader = store.seed_user("reader");
        let service = service(&store);

        service
            .dispatch(
                Audience::Users(vec![reader.id]),
                NotificationTemplate::follow(&actor.summary()),
            )
            .await
            .expect("first");
        service
            .dispatch(
                Audience::Users(vec![reader.id]),
                NotificationTemplate::new_post(&actor.summary(), 10),
            )
            .await
            .expect("second");

        let listed = service.list(reader.id).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kind, NotificationKind::NewPost);
        assert_eq!(listed[1].kind, NotificationKind::Follow);
    }

    #[tokio::test]
    async fn mark_read_rejects_invalid_ids() {
        let store = FakeStore::default();
        let reader = store.seed_user("reader");
        assert!(service(&store).mark_read(reader.id, &[0]).await.is_err());
    }
}
