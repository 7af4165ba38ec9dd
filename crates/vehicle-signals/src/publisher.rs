//! # Event Publisher
//!
//! Translates signal updates into outbound messages.
//!
//! Each route maps one signal path to a topic and a payload builder. A
//! snapshot produces one event per routed path it contains; unrouted paths
//! are ignored. Publish failures are logged and never propagate back into
//! the dispatcher.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use signal_bus::{validate_topic, MessagePublisher, OutboundEvent, PublishError};
use tracing::{debug, warn};

use crate::domain::path::SignalPath;
use crate::domain::snapshot::UpdateSnapshot;
use crate::domain::value::SignalValue;
use crate::ports::SignalHandler;

/// Default topics.
pub mod topics {
    /// Vehicle speed, payload `{"speed": <number>}`.
    pub const SPEED: &str = "kuksa/speed";
    /// Free-form debug commands received by the application.
    pub const COMMAND: &str = "debug/test";
}

/// Builds the JSON payload for one value.
pub type PayloadBuilder = Arc<dyn Fn(&SignalValue) -> serde_json::Value + Send + Sync>;

/// Where and how one signal is republished.
#[derive(Clone)]
pub struct EventRoute {
    topic: String,
    payload: PayloadBuilder,
}

impl EventRoute {
    pub fn new(
        topic: impl Into<String>,
        payload: impl Fn(&SignalValue) -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: Arc::new(payload),
        }
    }

    /// Route producing `{"<key>": <value>}`.
    pub fn field(topic: impl Into<String>, key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(topic, move |entry: &SignalValue| {
            let mut body = serde_json::Map::new();
            body.insert(key.clone(), entry.value.to_json());
            serde_json::Value::Object(body)
        })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn build(&self, entry: &SignalValue) -> Result<OutboundEvent, serde_json::Error> {
        OutboundEvent::json(self.topic.clone(), &(self.payload)(entry))
    }
}

impl fmt::Debug for EventRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRoute")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

/// Signal → topic translation table bound to a messaging channel.
pub struct EventPublisher {
    routes: HashMap<SignalPath, EventRoute>,
    channel: Arc<dyn MessagePublisher>,
}

impl EventPublisher {
    pub fn new(channel: Arc<dyn MessagePublisher>) -> Self {
        Self {
            routes: HashMap::new(),
            channel,
        }
    }

    /// Add a route, builder style.
    ///
    /// Routes with an unusable topic are dropped with a warning.
    #[must_use]
    pub fn route(mut self, path: SignalPath, route: EventRoute) -> Self {
        if let Err(e) = self.add_route(path, route) {
            warn!(error = %e, "Route ignored");
        }
        self
    }

    /// Add or replace the route for `path`.
    pub fn add_route(&mut self, path: SignalPath, route: EventRoute) -> Result<(), PublishError> {
        validate_topic(route.topic())?;
        debug!(path = %path, topic = route.topic(), "Route added");
        self.routes.insert(path, route);
        Ok(())
    }

    #[must_use]
    pub fn has_route(&self, path: &SignalPath) -> bool {
        self.routes.contains_key(path)
    }

    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// One event per routed path of `snapshot`, in order of first
    /// appearance. A path carried more than once is published with its
    /// last value, matching `UpdateSnapshot::get`.
    pub fn translate(&self, snapshot: &UpdateSnapshot) -> Vec<OutboundEvent> {
        let mut seen = HashSet::new();
        snapshot
            .paths()
            .filter(|path| seen.insert(*path))
            .filter_map(|path| {
                let route = self.routes.get(path)?;
                let entry = snapshot.get(path)?;
                match route.build(entry) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(path = %path, topic = route.topic(), error = %e, "Payload encoding failed");
                        None
                    }
                }
            })
            .collect()
    }

    /// Publish every event derived from `snapshot`.
    ///
    /// Returns the number of events the channel accepted.
    pub async fn publish_snapshot(&self, snapshot: &UpdateSnapshot) -> usize {
        let mut published = 0;
        for event in self.translate(snapshot) {
            let topic = event.topic().to_string();
            match self.channel.publish(event).await {
                Ok(receivers) => {
                    debug!(topic = %topic, receivers, "Event published");
                    published += 1;
                }
                Err(e) => warn!(topic = %topic, error = %e, "Event publish failed"),
            }
        }
        published
    }
}

#[async_trait]
impl SignalHandler for EventPublisher {
    async fn on_update(&self, snapshot: &UpdateSnapshot) {
        self.publish_snapshot(snapshot).await;
    }

    fn name(&self) -> &str {
        "EventPublisher"
    }
}
