pub(crate) mod pb {
    tonic::include_proto!("devconnect");
}

pub(crate) use pb::notification_service_server::{NotificationService, NotificationServiceServer};
pub(crate) use pb::{
    Actor, GetUnreadCountRequest, GetUnreadCountResponse, ListNotificationsRequest,
    ListNotificationsResponse, MarkNotificationsReadRequest, MarkNotificationsReadResponse,
    Notification, SubscribeNotificationsRequest,
};
