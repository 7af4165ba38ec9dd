//! # Application Configuration
//!
//! Every setting has a default and can be overridden from the environment.
//!
//! ## Environment Variables
//!
//! - `VAPP_BROKER_ADDR`: Databroker address (default: localhost:55555). Only
//!   logged for now; the binary runs the in-process simulated broker
//! - `VAPP_REQUEST_TIMEOUT_MS`: Deadline per broker request (default: 5000)
//! - `VAPP_BRAKE_HOLD_MS`: Hold after each brake-light step (default: 2000)
//! - `VAPP_SPEED_TOPIC`: Topic for speed events (default: kuksa/speed)
//! - `VAPP_COMMAND_TOPIC`: Inbound command topic, empty disables (default: debug/test)
//! - `VAPP_FEED_INTERVAL_MS`: Simulated provider period, 0 disables (default: 1000)
//! - `VAPP_SHUTDOWN_GRACE_MS`: Wait for in-flight handlers on stop (default: 2000)
//! - `VAPP_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)

use std::env;
use std::time::Duration;

use signal_bus::{validate_topic, PublishError};
use thiserror::Error;
use vehicle_signals::topics;

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub actuation: ActuationConfig,
    pub topics: TopicConfig,
    pub provider: ProviderConfig,
    pub runtime: RuntimeConfig,
}

/// Connection to the signal source.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    pub address: String,
    pub request_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:55555".to_string(),
            request_timeout: vehicle_signals::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Initial actuation sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuationConfig {
    /// Hold after each brake-light state.
    pub brake_hold: Duration,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            brake_hold: Duration::from_secs(2),
        }
    }
}

/// Messaging topics.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicConfig {
    pub speed: String,
    /// `None` disables the inbound command handler.
    pub command: Option<String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            speed: topics::SPEED.to_string(),
            command: Some(topics::COMMAND.to_string()),
        }
    }
}

/// Simulated data provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    /// `None` disables the provider.
    pub feed_interval: Option<Duration>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            feed_interval: Some(Duration::from_secs(1)),
        }
    }
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub shutdown_grace: Duration,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(2),
            log_level: "info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: '{value}' is not a valid number of milliseconds")]
    InvalidMillis { var: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("{field}: {source}")]
    InvalidTopic {
        field: &'static str,
        #[source]
        source: PublishError,
    },

    #[error("broker address is empty")]
    EmptyBrokerAddress,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` as the variable source; unset variables keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("VAPP_BROKER_ADDR") {
            config.broker.address = addr;
        }
        if let Some(timeout) = millis(&lookup, "VAPP_REQUEST_TIMEOUT_MS")? {
            config.broker.request_timeout = timeout;
        }
        if let Some(hold) = millis(&lookup, "VAPP_BRAKE_HOLD_MS")? {
            config.actuation.brake_hold = hold;
        }
        if let Some(topic) = lookup("VAPP_SPEED_TOPIC") {
            config.topics.speed = topic;
        }
        if let Some(topic) = lookup("VAPP_COMMAND_TOPIC") {
            config.topics.command = Some(topic).filter(|t| !t.is_empty());
        }
        if let Some(interval) = millis(&lookup, "VAPP_FEED_INTERVAL_MS")? {
            config.provider.feed_interval = Some(interval).filter(|d| !d.is_zero());
        }
        if let Some(grace) = millis(&lookup, "VAPP_SHUTDOWN_GRACE_MS")? {
            config.runtime.shutdown_grace = grace;
        }
        if let Some(level) = lookup("VAPP_LOG_LEVEL").or_else(|| lookup("RUST_LOG")) {
            config.runtime.log_level = level;
        }

        Ok(config)
    }

    /// Reject settings the application cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.address.trim().is_empty() {
            return Err(ConfigError::EmptyBrokerAddress);
        }
        if self.broker.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "request timeout",
            });
        }
        if self.actuation.brake_hold.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "brake-light hold",
            });
        }

        validate_topic(&self.topics.speed).map_err(|source| ConfigError::InvalidTopic {
            field: "speed topic",
            source,
        })?;
        if let Some(command) = &self.topics.command {
            validate_topic(command).map_err(|source| ConfigError::InvalidTopic {
                field: "command topic",
                source,
            })?;
        }

        Ok(())
    }
}

fn millis<F>(lookup: &F, var: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidMillis { var, value })
        })
        .transpose()
}
