//! Signal and command handlers of the brake-light application.

use async_trait::async_trait;
use signal_bus::OutboundEvent;
use tracing::{info, warn};
use vehicle_signals::{paths, EventPublisher, SignalHandler, SignalPath, UpdateSnapshot};

use crate::commands::CommandHandler;

/// Logs every speed update and republishes it through the event publisher.
pub struct SpeedHandler {
    publisher: EventPublisher,
}

impl SpeedHandler {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl SignalHandler for SpeedHandler {
    async fn on_update(&self, snapshot: &UpdateSnapshot) {
        match snapshot.get(&paths::speed()) {
            Some(entry) => info!(speed = %entry.value, timestamp_ms = entry.timestamp_ms, "Speed changed"),
            None => warn!("Speed notification without a speed value"),
        }
        self.publisher.publish_snapshot(snapshot).await;
    }

    fn name(&self) -> &str {
        "SpeedHandler"
    }
}

/// Logs one coordinate of the current location.
///
/// Latitude and longitude may arrive together or separately, so each axis
/// has its own handler and looks up only its own path.
pub struct LocationHandler {
    axis: &'static str,
    path: SignalPath,
}

impl LocationHandler {
    #[must_use]
    pub fn latitude() -> Self {
        Self {
            axis: "latitude",
            path: paths::latitude(),
        }
    }

    #[must_use]
    pub fn longitude() -> Self {
        Self {
            axis: "longitude",
            path: paths::longitude(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &SignalPath {
        &self.path
    }
}

#[async_trait]
impl SignalHandler for LocationHandler {
    async fn on_update(&self, snapshot: &UpdateSnapshot) {
        if let Some(entry) = snapshot.get(&self.path) {
            info!(axis = self.axis, value = %entry.value, "Location changed");
        }
    }

    fn name(&self) -> &str {
        self.axis
    }
}

/// Logs inbound command payloads.
pub struct LogCommand;

#[async_trait]
impl CommandHandler for LogCommand {
    async fn on_command(&self, message: &OutboundEvent) {
        match message.payload_str() {
            Some(text) => info!(topic = message.topic(), payload = text, "Command received"),
            None => info!(
                topic = message.topic(),
                bytes = message.payload().len(),
                "Binary command received"
            ),
        }
    }

    fn name(&self) -> &str {
        "LogCommand"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_bus::{InMemoryMessageBus, MessagePublisher, MessageSubscriber, TopicFilter};
    use std::sync::Arc;
    use std::time::Duration;
    use vehicle_signals::{EventRoute, SignalValue};

    #[tokio::test]
    async fn test_speed_handler_publishes() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut sub = bus.subscribe(TopicFilter::topic("kuksa/speed")).unwrap();
        let handler = SpeedHandler::new(
            EventPublisher::new(bus.clone()).route(paths::speed(), EventRoute::field("kuksa/speed", "speed")),
        );

        handler
            .on_update(&UpdateSnapshot::single(SignalValue::new(paths::speed(), 42.0_f32)))
            .await;

        let event = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.payload_json().unwrap()["speed"].as_f64(), Some(42.0));
        assert_eq!(bus.messages_published(), 1);
    }

    #[tokio::test]
    async fn test_location_handler_ignores_other_axis() {
        // Nothing observable beyond logs; make sure a partial snapshot is fine
        let handler = LocationHandler::latitude();
        handler
            .on_update(&UpdateSnapshot::single(SignalValue::new(paths::longitude(), 11.5_f64)))
            .await;
        assert_eq!(handler.path(), &paths::latitude());
        assert_eq!(LocationHandler::longitude().name(), "longitude");
    }
}
