use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::notification::Notification;

/// In-process fan-out of freshly stored notifications to live subscribers.
#[derive(Debug, Clone)]
pub(crate) struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers received the notification. Having none is not an error.
    pub(crate) fn publish(&self, notification: Notification) -> usize {
        let recipient_id = notification.recipient_id;
        match self.sender.send(notification) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(recipient_id, "no live notification subscribers");
                0
            }
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}
