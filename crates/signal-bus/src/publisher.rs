//! # Message Publisher
//!
//! Defines the publishing side of the bus.

use crate::message::{validate_topic, OutboundEvent, TopicFilter};
use crate::subscriber::{MessageStream, MessageSubscriber, Subscription, SubscriptionError};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Errors from publish operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The bus was closed; nothing can be published any more.
    #[error("Message bus closed")]
    Closed,

    /// The topic cannot be published to.
    #[error("Invalid topic {topic:?}: {reason}")]
    InvalidTopic { topic: String, reason: &'static str },

    /// The underlying transport failed.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Trait for publishing messages to the channel.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a message.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the message. Zero
    /// receivers is not an error: delivery is best-effort.
    async fn publish(&self, event: OutboundEvent) -> Result<usize, PublishError>;

    /// Get the total number of messages accepted for publishing.
    fn messages_published(&self) -> u64;
}

/// In-memory implementation of the messaging channel.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// A networked deployment would put an MQTT client behind the same traits.
pub struct InMemoryMessageBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<OutboundEvent>,

    /// Active subscription count by filter key.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Set once `close()` was called.
    closed: AtomicBool,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a new in-memory bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            messages_published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Get a stream of messages matching a filter.
    pub fn message_stream(&self, filter: TopicFilter) -> Result<MessageStream, SubscriptionError> {
        Ok(self.subscribe(filter)?.into_stream())
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Number of live subscriptions whose filter is exactly `topic`.
    #[must_use]
    pub fn topic_subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .ok()
            .and_then(|subs| subs.get(topic).copied())
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the bus. Later publishes and subscriptions fail with `Closed`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Message bus closed");
        }
    }

    /// Whether `close()` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryMessageBus {
    async fn publish(&self, event: OutboundEvent) -> Result<usize, PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }
        validate_topic(event.topic())?;

        self.messages_published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic().to_string();
        let bytes = event.payload().len();

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(
                    topic = %topic,
                    bytes,
                    receivers = receiver_count,
                    "Message published"
                );
                Ok(receiver_count)
            }
            Err(_) => {
                // No receivers, the message is dropped
                trace!(topic = %topic, "Message dropped (no receivers)");
                Ok(0)
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

impl MessageSubscriber for InMemoryMessageBus {
    fn subscribe(&self, filter: TopicFilter) -> Result<Subscription, SubscriptionError> {
        if self.is_closed() {
            return Err(SubscriptionError::Closed);
        }

        let receiver = self.sender.subscribe();
        let topic_key = filter.key();

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }

        debug!(topics = ?filter.topics, "New subscription created");

        Ok(Subscription::new(
            receiver,
            filter,
            self.subscriptions.clone(),
            topic_key,
        ))
    }
}
