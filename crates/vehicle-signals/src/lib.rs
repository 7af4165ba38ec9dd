//! # Vehicle Signals
//!
//! Reactive access to a hierarchical vehicle signal source: read and write
//! data points, react to their changes and republish derived events.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure data, no I/O
//!   - `SignalPath`: Dotted hierarchical signal identifier
//!   - `Value` / `SignalValue`: Typed value, tagged with its path
//!   - `UpdateSnapshot`: Batch of values delivered by one change notification
//!   - `SignalCatalog`: Data type and writability of every known signal
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `SignalSource`: Driven port to the signal broker
//!   - `SignalHandler`: Reaction to change notifications
//!
//! - **Adapters Layer** (`adapters/`): External connections
//!   - `InMemoryDatabroker`: Catalog-validating broker for local runs and tests
//!
//! - **Services**
//!   - `VehicleSignalClient`: get / set / subscribe with per-request deadlines
//!   - `SubscriptionRegistry` + `SignalDispatcher`: at most one handler per path,
//!     all handlers driven from one loop
//!   - `ActuationGateway`: validated writes and timed actuation sequences
//!   - `EventPublisher`: declarative signal → topic translation
//!
//! ## Errors
//!
//! Domain errors (`NotFound`, `NotWritable`, `TypeMismatch`) are recovered
//! and logged where they occur. `Transport` errors abort the current
//! operation and are returned to the caller.
//!
//! ## Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vehicle_signals::{
//!     paths, ActuationGateway, InMemoryDatabroker, TimedSequence, VehicleSignalClient,
//! };
//!
//! let broker = Arc::new(InMemoryDatabroker::standard());
//! let client = Arc::new(VehicleSignalClient::new(broker));
//! let gateway = ActuationGateway::new(Arc::clone(&client));
//!
//! let sequence = TimedSequence::toggle(paths::brake_light(), [true, false, true], hold);
//! gateway.run_sequence(&sequence).await?;
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod actuation;
pub mod adapters;
pub mod client;
pub mod domain;
pub mod error;
pub mod ports;
pub mod publisher;
pub mod registry;

pub use actuation::{
    ActuationGateway, ActuationOutcome, ActuationRequest, SequenceReport, SequenceStep,
    TimedSequence,
};
pub use adapters::InMemoryDatabroker;
pub use client::{Subscription, VehicleSignalClient, DEFAULT_REQUEST_TIMEOUT};
pub use domain::catalog::{paths, EntryKind, SignalCatalog, SignalMetadata};
pub use domain::path::SignalPath;
pub use domain::snapshot::UpdateSnapshot;
pub use domain::value::{DataType, SignalValue, Value};
pub use error::SignalError;
pub use ports::{SignalHandler, SignalSource, UpdateStream};
pub use publisher::{topics, EventPublisher, EventRoute, PayloadBuilder};
pub use registry::{DispatchStats, SignalDispatcher, SubscriptionRegistry};
