//! The brake-light application.
//!
//! On start it blinks the brake light (on, off, on), then observes speed
//! and location. Speed changes are republished on the speed topic; command
//! messages are logged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use signal_bus::MessagePublisher;
use tracing::{error, info, warn};
use vehicle_signals::{paths, EventPublisher, EventRoute, TimedSequence};

use crate::config::AppConfig;
use crate::handlers::{LocationHandler, LogCommand, SpeedHandler};
use crate::lifecycle::{LifecycleError, StartContext, VehicleApp};

pub struct BrakeLightApp {
    hold: Duration,
    speed_topic: String,
    command_topic: Option<String>,
    events: Arc<dyn MessagePublisher>,
}

impl BrakeLightApp {
    pub fn new(config: &AppConfig, events: Arc<dyn MessagePublisher>) -> Self {
        Self {
            hold: config.actuation.brake_hold,
            speed_topic: config.topics.speed.clone(),
            command_topic: config.topics.command.clone(),
            events,
        }
    }

    /// On, off, on; each state held for the configured time.
    #[must_use]
    pub fn brake_sequence(&self) -> TimedSequence {
        TimedSequence::toggle(paths::brake_light(), [true, false, true], self.hold)
    }
}

#[async_trait]
impl VehicleApp for BrakeLightApp {
    fn name(&self) -> &str {
        "brake-light"
    }

    async fn on_start(&self, ctx: &mut StartContext<'_>) -> Result<(), LifecycleError> {
        match ctx.gateway().run_sequence(&self.brake_sequence()).await {
            Ok(report) if report.rejected.is_empty() => {
                info!(steps = report.applied, "Brake light sequence complete");
            }
            Ok(report) => {
                warn!(
                    applied = report.applied,
                    rejected = report.rejected.len(),
                    "Brake light sequence completed with rejected steps"
                );
            }
            // Observing signals is still useful without the blink
            Err(e) => error!(error = %e, "Brake light sequence aborted"),
        }

        let speed_events = EventPublisher::new(Arc::clone(&self.events))
            .route(paths::speed(), EventRoute::field(self.speed_topic.clone(), "speed"));
        ctx.subscribe(paths::speed(), Arc::new(SpeedHandler::new(speed_events)))?;
        ctx.subscribe(paths::latitude(), Arc::new(LocationHandler::latitude()))?;
        ctx.subscribe(paths::longitude(), Arc::new(LocationHandler::longitude()))?;

        if let Some(topic) = &self.command_topic {
            ctx.on_command(topic.clone(), Arc::new(LogCommand))?;
        }

        Ok(())
    }
}
