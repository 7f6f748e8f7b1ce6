//! Channel registry and message fan-out.
//!
//! The hub owns its own mutex and never touches the keyspace. Delivery goes
//! through bounded per-subscriber channels with `try_send`, so one slow or
//! disconnected subscriber can neither block the publisher nor the remaining
//! subscribers of the same publish call.

use std::collections::HashMap;

use log::warn;
use tokio::sync::{mpsc, Mutex};

/// How many pushed messages a subscriber may lag behind before deliveries to
/// it start being dropped.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// A connection-scoped subscriber identity plus its push channel.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: String,
    pub sender: mpsc::Sender<String>,
}

#[derive(Debug, Default)]
pub struct PubSubHub {
    channels: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl PubSubHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `subscriber` under `channel`, preserving subscription order
    /// for delivery order. Idempotent per subscriber id. Returns the number
    /// of channels the subscriber is now registered on.
    pub async fn subscribe(&self, channel: &str, subscriber: Subscriber) -> usize {
        let mut channels = self.channels.lock().await;

        let subscribers = channels.entry(channel.to_string()).or_default();
        if !subscribers.iter().any(|s| s.id == subscriber.id) {
            subscribers.push(subscriber.clone());
        }

        channels
            .values()
            .filter(|subscribers| subscribers.iter().any(|s| s.id == subscriber.id))
            .count()
    }

    /// Delivers `message` to every subscriber currently registered on
    /// `channel`, in subscription order. Returns the count of deliveries
    /// attempted; publishing to a channel with no subscribers is a no-op.
    pub async fn publish(&self, channel: &str, message: &str) -> usize {
        let channels = self.channels.lock().await;

        let Some(subscribers) = channels.get(channel) else {
            return 0;
        };

        let line = format!("message {} {}", channel, message);
        let mut attempted = 0;

        for subscriber in subscribers {
            attempted += 1;
            if let Err(e) = subscriber.sender.try_send(line.clone()) {
                warn!(
                    "dropping publish to subscriber {} on channel {}: {}",
                    subscriber.id, channel, e
                );
            }
        }

        attempted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(id: &str) -> (Subscriber, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        (
            Subscriber {
                id: id.to_string(),
                sender,
            },
            receiver,
        )
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let hub = PubSubHub::new();
        assert_eq!(hub.publish("news", "hello").await, 0);
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber_in_order() {
        let hub = PubSubHub::new();
        let (first, mut first_rx) = subscriber("client-1");
        let (second, mut second_rx) = subscriber("client-2");

        hub.subscribe("news", first).await;
        hub.subscribe("news", second).await;

        assert_eq!(hub.publish("news", "hello world").await, 2);
        assert_eq!(first_rx.recv().await.unwrap(), "message news hello world");
        assert_eq!(second_rx.recv().await.unwrap(), "message news hello world");
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_per_id() {
        let hub = PubSubHub::new();
        let (sub, mut rx) = subscriber("client-1");

        assert_eq!(hub.subscribe("news", sub.clone()).await, 1);
        assert_eq!(hub.subscribe("news", sub.clone()).await, 1);
        assert_eq!(hub.subscribe("sports", sub).await, 2);

        hub.publish("news", "once").await;
        assert_eq!(rx.recv().await.unwrap(), "message news once");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stalled_subscriber_does_not_block_the_rest() {
        let hub = PubSubHub::new();

        // A subscriber with a full buffer that is never drained.
        let (stalled_tx, _stalled_rx) = mpsc::channel(1);
        stalled_tx.try_send("stuffing".to_string()).unwrap();
        hub.subscribe(
            "news",
            Subscriber {
                id: "stalled".to_string(),
                sender: stalled_tx,
            },
        )
        .await;

        let (healthy, mut healthy_rx) = subscriber("healthy");
        hub.subscribe("news", healthy).await;

        assert_eq!(hub.publish("news", "hi").await, 2);
        assert_eq!(healthy_rx.recv().await.unwrap(), "message news hi");
    }
}
