//! # Signal Bus - Topic-Based Messaging Channel
//!
//! The outbound (and inbound command) messaging channel of the vehicle
//! signal bridge.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ EventPublisher│                   │ Command      │
//! │ (vehicle app) │   publish()       │ handler      │
//! │               │ ──────┐           │              │
//! └───────────────┘       │           └──────────────┘
//!                         ▼                   ↑
//!                   ┌──────────────┐          │
//!                   │ Message Bus  │          │
//!                   │              │ ─────────┘
//!                   └──────────────┘  subscribe()
//! ```
//!
//! Publishing is fire-and-forget: a message with no subscriber is dropped,
//! and nothing is buffered or retried for late subscribers.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod message;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use message::{validate_topic, OutboundEvent, TopicFilter};
pub use publisher::{InMemoryMessageBus, MessagePublisher, PublishError};
pub use subscriber::{MessageStream, MessageSubscriber, Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
