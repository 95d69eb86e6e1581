use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::debug;

pub const NEW_MESSAGE_EVENT: &str = "new-message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl ChannelEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

type ChannelMap = HashMap<String, broadcast::Sender<ChannelEvent>>;

#[derive(Debug, Clone)]
pub struct ChannelHub {
    channels: Arc<RwLock<ChannelMap>>,
    capacity: usize,
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(100)
    }
}

fn remove_if_idle(channels: &mut ChannelMap, channel: &str) {
    if channels
        .get(channel)
        .is_some_and(|tx| tx.receiver_count() == 0)
    {
        channels.remove(channel);
        debug!("Closed idle channel {channel}");
    }
}

/// Removes its channel from the hub once the last subscriber is gone.
#[derive(Debug)]
struct ChannelLease {
    channel: String,
    channels: Arc<RwLock<ChannelMap>>,
}

impl Drop for ChannelLease {
    fn drop(&mut self) {
        if let Ok(mut channels) = self.channels.try_write() {
            remove_if_idle(&mut channels, &self.channel);
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let channels = self.channels.clone();
            let channel = std::mem::take(&mut self.channel);
            handle.spawn(async move {
                remove_if_idle(&mut *channels.write().await, &channel);
            });
        }
    }
}

/// A live subscription to one channel.
#[derive(Debug)]
pub struct Subscription {
    // Dropped before `lease`, so the lease sees the final receiver count.
    rx: broadcast::Receiver<ChannelEvent>,
    lease: ChannelLease,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.lease.channel
    }

    pub async fn recv(&mut self) -> Result<ChannelEvent, RecvError> {
        self.rx.recv().await
    }
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn ticket_channel(ticket_id: i32) -> String {
        format!("ticket-{ticket_id}")
    }

    /// The ticket id behind a channel name; only canonical `ticket-{id}`
    /// names with a positive id are accepted.
    pub fn parse_ticket_channel(channel: &str) -> Option<i32> {
        let id = channel.strip_prefix("ticket-")?.parse::<i32>().ok()?;
        (id > 0 && Self::ticket_channel(id) == channel).then_some(id)
    }

    /// Receivers are created under the map lock so a concurrent prune can
    /// never drop a channel between lookup and subscribe.
    pub async fn subscribe(&self, channel: &str) -> Subscription {
        let rx = {
            let existing = self.channels.read().await;
            existing.get(channel).map(broadcast::Sender::subscribe)
        };
        let rx = match rx {
            Some(rx) => rx,
            None => self
                .channels
                .write()
                .await
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe(),
        };
        Subscription {
            rx,
            lease: ChannelLease {
                channel: channel.to_string(),
                channels: self.channels.clone(),
            },
        }
    }

    /// Returns how many subscribers received the event. Channels nobody
    /// subscribes to are never created.
    pub async fn publish(&self, channel: &str, event: ChannelEvent) -> usize {
        let channels = self.channels.read().await;
        let Some(tx) = channels.get(channel) else {
            debug!("No subscribers on channel {channel}");
            return 0;
        };
        tx.send(event).unwrap_or(0)
    }

    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = ChannelHub::new(8);
        let mut a = hub.subscribe("ticket-1").await;
        let mut b = hub.subscribe("ticket-1").await;

        let delivered = hub
            .publish("ticket-1", ChannelEvent::new(NEW_MESSAGE_EVENT, json!({"id": 1})))
            .await;
        assert_eq!(delivered, 2);

        assert_eq!(a.recv().await.unwrap().data["id"], 1);
        assert_eq!(b.recv().await.unwrap().event, NEW_MESSAGE_EVENT);
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let hub = ChannelHub::new(8);
        let other = hub.subscribe("ticket-2").await;

        let delivered = hub
            .publish("ticket-1", ChannelEvent::new(NEW_MESSAGE_EVENT, json!({})))
            .await;

        assert_eq!(delivered, 0);
        assert_eq!(other.channel(), "ticket-2");
        assert_eq!(hub.subscriber_count("ticket-2").await, 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_creates_no_channel() {
        let hub = ChannelHub::new(8);
        for ticket_id in 0..1000 {
            let delivered = hub
                .publish(
                    &ChannelHub::ticket_channel(ticket_id),
                    ChannelEvent::new(NEW_MESSAGE_EVENT, json!({})),
                )
                .await;
            assert_eq!(delivered, 0);
        }
        assert_eq!(hub.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_last_subscriber_leaving_closes_channel() {
        let hub = ChannelHub::new(8);
        let first = hub.subscribe("ticket-1").await;
        let second = hub.subscribe("ticket-1").await;
        let _keep = hub.subscribe("ticket-2").await;
        assert_eq!(hub.channel_count().await, 2);

        drop(first);
        assert_eq!(hub.subscriber_count("ticket-1").await, 1);
        assert_eq!(hub.channel_count().await, 2);

        drop(second);
        assert_eq!(hub.channel_count().await, 1);
        assert_eq!(hub.subscriber_count("ticket-2").await, 1);
    }

    #[test]
    fn test_ticket_channel_name() {
        assert_eq!(ChannelHub::ticket_channel(42), "ticket-42");
        assert_eq!(ChannelHub::parse_ticket_channel("ticket-42"), Some(42));
        for bad in ["ticket-", "ticket-0", "ticket--7", "ticket-+4", "ticket-007", "room-1", "ticket-1x", "ticket-99999999999"] {
            assert_eq!(ChannelHub::parse_ticket_channel(bad), None, "{bad}");
        }
    }
}
