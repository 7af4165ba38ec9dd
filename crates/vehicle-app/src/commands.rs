//! # Inbound Commands
//!
//! Topic → handler table for messages arriving on the messaging channel.
//! The table is filled during startup and installed in one step; one loop
//! then drives every command handler, like `SignalDispatcher` does for
//! signal handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use signal_bus::{
    validate_topic, MessageStream, MessageSubscriber, OutboundEvent, PublishError,
    SubscriptionError, TopicFilter,
};
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, error, info};

/// Reaction to a message received on a command topic.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn on_command(&self, message: &OutboundEvent);

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Errors while building or installing the command table.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("topic {topic} already has a command handler")]
    DuplicateTopic { topic: String },

    #[error(transparent)]
    InvalidTopic(#[from] PublishError),

    #[error("command subscription failed: {0}")]
    Subscription(#[from] SubscriptionError),
}

/// Startup-time topic → handler table.
#[derive(Default)]
pub struct CommandTable {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    order: Vec<String>,
}

impl CommandTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `topic`. One handler per topic.
    pub fn register(
        &mut self,
        topic: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), CommandError> {
        let topic = topic.into();
        validate_topic(&topic)?;

        if self.handlers.contains_key(&topic) {
            error!(topic = %topic, rejected = handler.name(), "Duplicate command handler rejected");
            return Err(CommandError::DuplicateTopic { topic });
        }

        debug!(topic = %topic, handler = handler.name(), "Command handler registered");
        self.order.push(topic.clone());
        self.handlers.insert(topic, handler);
        Ok(())
    }

    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Subscribe every registered topic on `channel`.
    pub fn install(self, channel: &dyn MessageSubscriber) -> Result<CommandDispatcher, CommandError> {
        let mut streams = StreamMap::new();
        for topic in &self.order {
            let stream = channel.subscribe(TopicFilter::topic(topic.clone()))?.into_stream();
            streams.insert(topic.clone(), stream);
            info!(topic = %topic, "Command topic subscribed");
        }

        Ok(CommandDispatcher {
            streams,
            handlers: self.handlers,
        })
    }
}

/// Drives command handlers until shutdown.
pub struct CommandDispatcher {
    streams: StreamMap<String, MessageStream>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandDispatcher {
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Deliver messages until `shutdown` flips or every topic stream ends.
    /// Returns the number of delivered messages.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut delivered = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                next = self.streams.next() => {
                    let Some((topic, message)) = next else {
                        debug!("All command streams ended");
                        break;
                    };
                    if let Some(handler) = self.handlers.get(&topic) {
                        handler.on_command(&message).await;
                        delivered += 1;
                    }
                }
            }
        }

        info!(delivered, "Command dispatcher stopped");
        delivered
    }
}
