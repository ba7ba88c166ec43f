//! Change-notification feed
//!
//! Domain models publish a `ChangeNotification` after every mutation;
//! representation sessions subscribe and re-materialize on relevant ones.

use async_stream::stream;
use futures_util::Stream;
use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::ChangeNotification;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeNotification>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a notification. Having no listeners is not an error.
    pub fn publish(&self, notification: ChangeNotification) {
        trace!(
            "change in '{}' affecting {:?}",
            notification.editing_context_id,
            notification.affected_root_ids
        );
        let _ignored = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Notifications as a stream; missed notifications are skipped.
    pub fn receive(&self) -> impl Stream<Item = ChangeNotification> {
        let mut receiver = self.sender.subscribe();

        stream! {
            loop {
                match receiver.recv().await {
                    Ok(notification) => yield notification,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{pin_mut, StreamExt};

    use super::*;

    #[tokio::test]
    async fn test_publish_without_listeners_is_silent() {
        let feed = ChangeFeed::new(4);
        feed.publish(ChangeNotification::new("ctx", vec![]));
        assert_eq!(feed.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_receive_yields_published_notifications() {
        let feed = ChangeFeed::new(4);
        let stream = feed.receive();
        pin_mut!(stream);

        feed.publish(ChangeNotification::new("ctx", vec!["root".into()]));

        let received = stream.next().await.unwrap();
        assert!(received.affects("ctx", "root"));
    }
}
