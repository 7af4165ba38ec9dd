//! # Message Subscriber
//!
//! Defines the subscription side of the bus.

use crate::message::{OutboundEvent, TopicFilter};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was closed.
    #[error("Message bus closed")]
    Closed,
}

/// Trait for subscribing to messages from the bus.
pub trait MessageSubscriber: Send + Sync {
    /// Subscribe to messages matching a filter.
    fn subscribe(&self, filter: TopicFilter) -> Result<Subscription, SubscriptionError>;
}

/// Decrements the per-topic subscriber count when the subscription goes away.
struct SubscriptionGuard {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    topic_key: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        if let Some(count) = subs.get_mut(&self.topic_key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.topic_key);
            }
        }
        debug!(topic = %self.topic_key, "Subscription dropped");
    }
}

/// A subscription handle for receiving messages.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    receiver: broadcast::Receiver<OutboundEvent>,
    filter: TopicFilter,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<OutboundEvent>,
        filter: TopicFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        topic_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            guard: SubscriptionGuard {
                subscriptions,
                topic_key,
            },
        }
    }

    /// Receive the next message that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next matching message
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<OutboundEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some messages dropped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Try to receive the next message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - A matching message was available
    /// - `Ok(None)` - No message available
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<OutboundEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Turn this subscription into a `Stream` of matching messages.
    #[must_use]
    pub fn into_stream(self) -> MessageStream {
        MessageStream {
            inner: BroadcastStream::new(self.receiver),
            filter: self.filter,
            _guard: self.guard,
        }
    }
}

/// A stream of messages matching a subscription's filter.
///
/// Implements `tokio_stream::Stream` for use with stream combinators and
/// `StreamMap`.
pub struct MessageStream {
    inner: BroadcastStream<OutboundEvent>,
    filter: TopicFilter,
    _guard: SubscriptionGuard,
}

impl MessageStream {
    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

impl Stream for MessageStream {
    type Item = OutboundEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if this.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Stream lagged, some messages dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{InMemoryMessageBus, MessagePublisher};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_subscription_recv() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe(TopicFilter::all()).unwrap();

        bus.publish(OutboundEvent::text("debug/test", "hello"))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("message");

        assert_eq!(received.payload_str(), Some("hello"));
    }

    #[tokio::test]
    async fn test_subscription_filter() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe(TopicFilter::topic("debug/test")).unwrap();

        // Filtered out
        bus.publish(OutboundEvent::text("kuksa/speed", "{}"))
            .await
            .unwrap();
        bus.publish(OutboundEvent::text("debug/test", "ping"))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("message");

        assert_eq!(received.topic(), "debug/test");
        assert_eq!(received.payload_str(), Some("ping"));
    }

    #[tokio::test]
    async fn test_subscription_drop_cleanup() {
        let bus = InMemoryMessageBus::new();

        {
            let _sub1 = bus.subscribe(TopicFilter::topic("debug/test")).unwrap();
            let _sub2 = bus.subscribe(TopicFilter::all()).unwrap();
            assert_eq!(bus.subscriber_count(), 2);
            assert_eq!(bus.topic_subscriber_count("debug/test"), 1);
        }

        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.topic_subscriber_count("debug/test"), 0);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe(TopicFilter::all()).unwrap();

        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_message_stream_filters_and_orders() {
        let bus = InMemoryMessageBus::new();
        let mut stream = bus.message_stream(TopicFilter::topic("debug/test")).unwrap();

        for payload in ["one", "skip", "two"] {
            let topic = if payload == "skip" { "other" } else { "debug/test" };
            bus.publish(OutboundEvent::text(topic, payload)).await.unwrap();
        }

        let first = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("message");
        let second = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("message");

        assert_eq!(first.payload_str(), Some("one"));
        assert_eq!(second.payload_str(), Some("two"));
    }

    #[tokio::test]
    async fn test_message_stream_keeps_topic_count() {
        let bus = InMemoryMessageBus::new();
        let stream = bus.message_stream(TopicFilter::topic("debug/test")).unwrap();
        assert_eq!(bus.topic_subscriber_count("debug/test"), 1);

        drop(stream);
        assert_eq!(bus.topic_subscriber_count("debug/test"), 0);
    }
}
