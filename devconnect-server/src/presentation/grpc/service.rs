use std::pin::Pin;

use futures::{Stream, StreamExt, stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::domain::notification::Notification as DomainNotification;
use crate::presentation::AppState;
use crate::presentation::grpc::mappers::to_proto_notification;

use super::interceptors::authenticate_request;
use super::proto::{
    GetUnreadCountRequest, GetUnreadCountResponse, ListNotificationsRequest,
    ListNotificationsResponse, MarkNotificationsReadRequest, MarkNotificationsReadResponse,
    Notification, NotificationService, NotificationServiceServer, SubscribeNotificationsRequest,
};
use super::status::map_domain_error;

type NotificationStream = Pin<Box<dyn Stream<Item = Result<Notification, Status>> + Send>>;

#[derive(Clone)]
pub(crate) struct GrpcNotificationService {
    state: AppState,
}

impl GrpcNotificationService {
    pub(crate) fn new(state: AppState) -> Self {
        Self { state }
    }

    pub(crate) fn into_server(self) -> NotificationServiceServer<Self> {
        NotificationServiceServer::new(self)
    }
}

/// Notifications from the hub addressed to `user_id`, in publish order.
///
/// A lagging receiver skips what it missed and keeps going; the stream ends
/// when the hub is dropped.
pub(crate) fn recipient_stream(
    receiver: broadcast::Receiver<DomainNotification>,
    user_id: i64,
) -> impl Stream<Item = DomainNotification> + Send + 'static {
    stream::unfold(receiver, move |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(notification) if notification.recipient_id == user_id => {
                    return Some((notification, receiver));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id, skipped, "notification subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

#[tonic::async_trait]
impl NotificationService for GrpcNotificationService {
    type SubscribeNotificationsStream = NotificationStream;

    async fn subscribe_notifications(
        &self,
        request: Request<SubscribeNotificationsRequest>,
    ) -> Result<Response<Self::SubscribeNotificationsStream>, Status> {
        let auth = authenticate_request(self.state.auth_service.jwt(), request.metadata())?;
        info!(user_id = auth.user_id, username = ?auth.username, "notification subscriber connected");

        let receiver = self.state.notification_service.subscribe();
        let updates = recipient_stream(receiver, auth.user_id);
        let updates = updates.map(|notification| Ok::<_, Status>(to_proto_notification(notification)));

        Ok(Response::new(Box::pin(updates) as NotificationStream))
    }

    async fn list_notifications(
        &self,
        request: Request<ListNotificationsRequest>,
    ) -> Result<Response<ListNotificationsResponse>, Status> {
        let auth = authenticate_request(self.state.auth_service.jwt(), request.metadata())?;

        let notifications = self
            .state
            .notification_service
            .list(auth.user_id)
            .await
            .map_err(map_domain_error)?;

        Ok(Response::new(ListNotificationsResponse {
            notifications: notifications
                .into_iter()
                .map(to_proto_notification)
                .collect(),
        }))
    }

    async fn get_unread_count(
        &self,
        request: Request<GetUnreadCountRequest>,
    ) -> Result<Response<GetUnreadCountResponse>, Status> {
        let auth = authenticate_request(self.state.auth_service.jwt(), request.metadata())?;

        let unread = self
            .state
            .notification_service
            .unread_count(auth.user_id)
            .await
            .map_err(map_domain_error)?;

        Ok(Response::new(GetUnreadCountResponse { unread }))
    }

    async fn mark_notifications_read(
        &self,
        request: Request<MarkNotificationsReadRequest>,
    ) -> Result<Response<MarkNotificationsReadResponse>, Status> {
        let auth = authenticate_request(self.state.auth_service.jwt(), request.metadata())?;
        let input = request.into_inner();

        let updated = if input.all {
            self.state
                .notification_service
                .mark_all_read(auth.user_id)
                .await
        } else {
            self.state
                .notification_service
                .mark_read(auth.user_id, &input.ids)
                .await
        }
        .map_err(map_domain_error)?;

        Ok(Response::new(MarkNotificationsReadResponse { updated }))
    }
}
