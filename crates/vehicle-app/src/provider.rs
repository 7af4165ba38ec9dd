//! # Simulated Provider
//!
//! Stands in for the data providers that own sensor values. Every tick it
//! reads the current speed and location and feeds the next sample into the
//! broker as one batch, so subscriptions see live updates.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use vehicle_signals::{
    paths, InMemoryDatabroker, SignalError, SignalPath, SignalSource, UpdateSnapshot, Value,
};

/// Speed increase per tick, km/h.
const SPEED_STEP: f64 = 5.0;
/// Speed wraps back to zero above this, km/h.
const MAX_SPEED: f64 = 130.0;
/// Position drift per tick, degrees.
const DRIFT: f64 = 0.0001;
/// Starting position when the broker has no location yet.
const ORIGIN: (f64, f64) = (48.1374, 11.5755);

pub struct SimulatedProvider {
    broker: Arc<InMemoryDatabroker>,
    interval: Duration,
}

impl SimulatedProvider {
    pub fn new(broker: Arc<InMemoryDatabroker>, interval: Duration) -> Self {
        Self { broker, interval }
    }

    /// Feed one sample derived from the current values.
    pub async fn tick(&self) -> Result<UpdateSnapshot, SignalError> {
        let speed = self.current(&paths::speed()).await?.unwrap_or(0.0);
        let latitude = self.current(&paths::latitude()).await?.unwrap_or(ORIGIN.0);
        let longitude = self.current(&paths::longitude()).await?.unwrap_or(ORIGIN.1);

        let next_speed = if speed + SPEED_STEP > MAX_SPEED {
            0.0
        } else {
            speed + SPEED_STEP
        };
        #[allow(clippy::cast_possible_truncation)]
        let next_speed = next_speed as f32;

        self.broker.feed(vec![
            (paths::speed(), Value::Float(next_speed)),
            (paths::latitude(), Value::Double(latitude + DRIFT)),
            (paths::longitude(), Value::Double(longitude + DRIFT)),
        ])
    }

    /// Tick until `shutdown` flips or the broker goes away.
    /// Returns the number of samples fed.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "Simulated provider started");

        let mut fed = 0;
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
                _ = ticker.tick() => match self.tick().await {
                    Ok(sample) => {
                        debug!(entries = sample.len(), "Sample fed");
                        fed += 1;
                    }
                    Err(e) if e.is_transport() => {
                        warn!(error = %e, "Provider lost the databroker");
                        break;
                    }
                    Err(e) => warn!(error = %e, "Sample rejected"),
                },
            }
        }

        info!(fed, "Simulated provider stopped");
        fed
    }

    /// Current numeric value, `None` if the provider never set it.
    async fn current(&self, path: &SignalPath) -> Result<Option<f64>, SignalError> {
        let current = self.broker.get(path).await?;
        if current.timestamp_ms == 0 {
            return Ok(None);
        }
        Ok(current.value.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_tick_starts_at_origin() {
        let broker = Arc::new(InMemoryDatabroker::standard());
        let provider = SimulatedProvider::new(broker.clone(), Duration::from_secs(1));

        let sample = provider.tick().await.unwrap();
        assert_eq!(sample.len(), 3);
        assert_eq!(sample.value(&paths::speed()), Some(&Value::Float(5.0)));

        let lat = broker.get(&paths::latitude()).await.unwrap();
        assert!((lat.value.as_f64().unwrap() - (ORIGIN.0 + DRIFT)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_speed_wraps() {
        let broker = Arc::new(InMemoryDatabroker::standard());
        broker
            .feed(vec![(paths::speed(), Value::Float(128.0))])
            .unwrap();
        let provider = SimulatedProvider::new(broker.clone(), Duration::from_secs(1));

        let sample = provider.tick().await.unwrap();
        assert_eq!(sample.value(&paths::speed()), Some(&Value::Float(0.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let broker = Arc::new(InMemoryDatabroker::standard());
        let provider = SimulatedProvider::new(broker.clone(), Duration::from_secs(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(provider.run(shutdown_rx));
        // Ticks at 0s, 1s and 2s
        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown_tx.send(true).unwrap();

        assert_eq!(task.await.unwrap(), 3);
        assert_eq!(
            broker.get(&paths::speed()).await.unwrap().value,
            Value::Float(15.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_broker_disconnects() {
        let broker = Arc::new(InMemoryDatabroker::standard());
        broker.disconnect_now();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let fed = SimulatedProvider::new(broker, Duration::from_secs(1))
            .run(shutdown_rx)
            .await;
        assert_eq!(fed, 0);
    }
}
