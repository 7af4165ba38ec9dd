//! # Vehicle App
//!
//! The brake-light application and the lifecycle that runs it.
//! The `main.rs` binary wires it to an in-process databroker and message bus.
//!
//! ## Modules
//!
//! - `config/` - Settings with defaults and environment overrides
//! - `lifecycle/` - Run states, startup and graceful shutdown
//! - `app/` - The brake-light `VehicleApp`
//! - `handlers/` - Speed, location and command handlers
//! - `commands/` - Inbound command topics and their dispatcher
//! - `provider/` - Simulated sensor feed

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod app;
pub mod commands;
pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod provider;

pub use app::BrakeLightApp;
pub use commands::{CommandDispatcher, CommandError, CommandHandler, CommandTable};
pub use config::{AppConfig, ConfigError};
pub use lifecycle::{AppLifecycle, AppState, LifecycleError, StartContext, VehicleApp};
pub use provider::SimulatedProvider;
