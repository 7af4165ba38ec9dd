//! # Bus Messages
//!
//! Defines the message type that flows through the bus and the topic
//! filter subscribers use to select messages.

use serde::{Deserialize, Serialize};

use crate::publisher::PublishError;

/// A message handed to the messaging channel: a topic and opaque payload bytes.
///
/// Created per publish call and not retained by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEvent {
    topic: String,
    payload: Vec<u8>,
}

impl OutboundEvent {
    /// Create an event from raw payload bytes.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Create an event carrying a UTF-8 text payload.
    pub fn text(topic: impl Into<String>, payload: &str) -> Self {
        Self::new(topic, payload.as_bytes().to_vec())
    }

    /// Create an event whose payload is the JSON encoding of `value`.
    pub fn json<T: Serialize + ?Sized>(
        topic: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(topic, serde_json::to_vec(value)?))
    }

    /// The topic this event is published on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload as text, if it is valid UTF-8.
    #[must_use]
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Decode the payload as JSON.
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Check that a topic is usable for publishing and exact-match subscriptions.
///
/// Topics must be non-empty, must not carry surrounding whitespace and must
/// not contain the wildcard characters `#` or `+`.
pub fn validate_topic(topic: &str) -> Result<(), PublishError> {
    let reason = if topic.is_empty() {
        Some("topic is empty")
    } else if topic.trim() != topic {
        Some("topic has leading or trailing whitespace")
    } else if topic.contains(['#', '+']) {
        Some("wildcards are not allowed")
    } else if topic.contains('\0') {
        Some("topic contains a NUL character")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(PublishError::InvalidTopic {
            topic: topic.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Selects which messages a subscription receives.
///
/// An empty topic list matches every message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    /// Exact topics to receive.
    pub topics: Vec<String>,
}

impl TopicFilter {
    /// A filter matching every topic.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: Vec::new() }
    }

    /// A filter matching exactly the given topics.
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// A filter matching a single topic.
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
        }
    }

    /// Check whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &OutboundEvent) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == event.topic())
    }

    /// Key used for per-topic subscriber accounting.
    pub(crate) fn key(&self) -> String {
        if self.topics.is_empty() {
            "*".to_string()
        } else {
            self.topics.join(",")
        }
    }
}
