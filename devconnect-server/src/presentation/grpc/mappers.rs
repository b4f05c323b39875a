use chrono::{DateTime, Utc};
use prost_types::Timestamp;

use crate::domain::notification::Notification as DomainNotification;
use crate::domain::user::AuthorSummary;

use super::proto::{Actor, Notification};

pub(crate) fn to_proto_notification(notification: DomainNotification) -> Notification {
    Notification {
        id: notification.id,
        recipient_id: notification.recipient_id,
        kind: notification.kind.to_string(),
        title: notification.title,
        message: notification.message,
        is_read: notification.is_read,
        related_post_id: notification.related_post_id,
        related_comment_id: notification.related_comment_id,
        actor: Some(to_proto_actor(notification.actor)),
        created_at: Some(to_proto_timestamp(notification.created_at)),
    }
}

fn to_proto_actor(actor: AuthorSummary) -> Actor {
    Actor {
        id: actor.id,
        username: actor.username,
        full_name: actor.full_name,
        avatar_url: actor.avatar_url,
    }
}

fn to_proto_timestamp(value: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: value.timestamp(),
        nanos: value.timestamp_subsec_nanos() as i32,
    }
}
