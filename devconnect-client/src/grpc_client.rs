use std::time::Duration;

use futures::{Stream, StreamExt};
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};

use crate::error::{ClientError, ClientResult};
use crate::models::{Author, Notification};

/// Generated protobuf types and the notification service client.
pub mod pb {
    tonic::include_proto!("devconnect");
}

type NotificationClient = pb::notification_service_client::NotificationServiceClient<Channel>;

/// gRPC client of the notification service. Every call needs a token.
#[derive(Debug, Clone)]
pub struct GrpcClient {
    endpoint: String,
}

impl GrpcClient {
    /// Creates a client for `endpoint` (`host:port` or a full URL).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Opens the real-time notification stream of the token owner.
    ///
    /// The stream ends when the server shuts down or the connection drops.
    pub async fn subscribe(
        &self,
        token: &str,
    ) -> ClientResult<impl Stream<Item = ClientResult<Notification>> + Send + 'static> {
        // Streams must not be cut by the per-call timeout.
        let mut client = self.connect(None).await?;
        let request =
            Self::attach_bearer_token(tonic::Request::new(pb::SubscribeNotificationsRequest {}), token)?;

        let stream = client
            .subscribe_notifications(request)
            .await
            .map_err(ClientError::from_grpc_status)?
            .into_inner();

        Ok(stream.map(|item| {
            item.map_err(ClientError::from_grpc_status)
                .and_then(Self::map_notification)
        }))
    }

    /// Latest notifications of the token owner.
    pub async fn list_notifications(&self, token: &str) -> ClientResult<Vec<Notification>> {
        let mut client = self.connect(Some(Duration::from_secs(15))).await?;
        let request =
            Self::attach_bearer_token(tonic::Request::new(pb::ListNotificationsRequest {}), token)?;

        let response = client
            .list_notifications(request)
            .await
            .map_err(ClientError::from_grpc_status)?;
        response
            .into_inner()
            .notifications
            .into_iter()
            .map(Self::map_notification)
            .collect()
    }

    /// Number of unread notifications.
    pub async fn unread_count(&self, token: &str) -> ClientResult<i64> {
        let mut client = self.connect(Some(Duration::from_secs(15))).await?;
        let request =
            Self::attach_bearer_token(tonic::Request::new(pb::GetUnreadCountRequest {}), token)?;

        let response = client
            .get_unread_count(request)
            .await
            .map_err(ClientError::from_grpc_status)?;
        Ok(response.into_inner().unread)
    }

    /// Marks `ids` as read, or everything when `ids` is empty.
    pub async fn mark_read(&self, token: &str, ids: &[i64]) -> ClientResult<u64> {
        let mut client = self.connect(Some(Duration::from_secs(15))).await?;
        let message = pb::MarkNotificationsReadRequest {
            ids: ids.to_vec(),
            all: ids.is_empty(),
        };
        let request = Self::attach_bearer_token(tonic::Request::new(message), token)?;

        let response = client
            .mark_notifications_read(request)
            .await
            .map_err(ClientError::from_grpc_status)?;
        Ok(response.into_inner().updated)
    }

    async fn connect(&self, timeout: Option<Duration>) -> ClientResult<NotificationClient> {
        let endpoint =
            if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
                self.endpoint.clone()
            } else {
                format!("http://{}", self.endpoint)
            };

        let mut endpoint = Endpoint::from_shared(endpoint)
            .map_err(|err| ClientError::InvalidRequest(format!("invalid grpc endpoint: {err}")))?
            .connect_timeout(Duration::from_secs(5));
        if let Some(timeout) = timeout {
            endpoint = endpoint.timeout(timeout);
        }

        let channel = endpoint.connect().await.map_err(ClientError::GrpcTransport)?;
        Ok(NotificationClient::new(channel))
    }

    fn map_notification(proto: pb::Notification) -> ClientResult<Notification> {
        let actor = proto.actor.ok_or_else(|| {
            ClientError::InvalidRequest("grpc notification is missing actor".to_string())
        })?;
        let created_at = proto.created_at.ok_or_else(|| {
            ClientError::InvalidRequest("grpc notification is missing created_at".to_string())
        })?;

        Ok(Notification {
            id: proto.id,
            kind: proto.kind,
            title: proto.title,
            message: proto.message,
            is_read: proto.is_read,
            related_post_id: proto.related_post_id,
            related_comment_id: proto.related_comment_id,
            actor: Author {
                id: actor.id,
                username: actor.username,
                full_name: actor.full_name,
                avatar_url: actor.avatar_url,
            },
            created_at: Self::map_timestamp(created_at, "notification.created_at")?,
        })
    }

    fn map_timestamp(
        ts: prost_types::Timestamp,
        field_name: &str,
    ) -> ClientResult<chrono::DateTime<chrono::Utc>> {
        let nanos = u32::try_from(ts.nanos).unwrap_or(0);
        chrono::DateTime::from_timestamp(ts.seconds, nanos).ok_or_else(|| {
            ClientError::InvalidRequest(format!("invalid grpc timestamp in {field_name}"))
        })
    }

    fn attach_bearer_token<T>(
        mut request: tonic::Request<T>,
        token: &str,
    ) -> ClientResult<tonic::Request<T>> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ClientError::Unauthorized);
        }

        let header = MetadataValue::try_from(format!("Bearer {token}")).map_err(|_| {
            ClientError::InvalidRequest("invalid token format for grpc metadata".to_string())
        })?;

        request.metadata_mut().insert("authorization", header);
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proto_notification() -> pb::Notification {
        pb::Notification {
            id: 5,
            recipient_id: 1,
            kind: "follow".to_string(),
            title: "New follower".to_string(),
            message: "neo started following you".to_string(),
            is_read: false,
            related_post_id: None,
            related_comment_id: None,
            actor: Some(pb::Actor {
                id: 2,
                username: Some("neo".to_string()),
                full_name: None,
                avatar_url: None,
            }),
            created_at: Some(prost_types::Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            }),
        }
    }

    #[test]
    fn attach_bearer_token_sets_authorization_metadata() {
        let request = tonic::Request::new(());
        let request =
            GrpcClient::attach_bearer_token(request, "token123").expect("token must be accepted");

        let auth = request
            .metadata()
            .get("authorization")
            .expect("authorization metadata must exist")
            .to_str()
            .expect("metadata must be valid ascii");
        assert_eq!(auth, "Bearer token123");
    }

    #[test]
    fn attach_bearer_token_rejects_empty_token() {
        let request = tonic::Request::new(());
        let err = GrpcClient::attach_bearer_token(request, "   ").expect_err("must fail");
        assert!(matches!(err, ClientError::Unauthorized));
    }

    #[test]
    fn map_notification_copies_actor_and_time() {
        let notification = GrpcClient::map_notification(proto_notification()).expect("must map");

        assert_eq!(notification.id, 5);
        assert_eq!(notification.actor.username.as_deref(), Some("neo"));
        assert_eq!(notification.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn map_notification_requires_actor() {
        let mut proto = proto_notification();
        proto.actor = None;

        let err = GrpcClient::map_notification(proto).expect_err("must fail");
        match err {
            ClientError::InvalidRequest(msg) => assert!(msg.contains("missing actor")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
