//! Outbound Ports (Driven Ports)
//!
//! The signal broker as seen by this crate. The wire protocol behind an
//! implementation is not this crate's concern.

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::domain::path::SignalPath;
use crate::domain::snapshot::UpdateSnapshot;
use crate::domain::value::{SignalValue, Value};
use crate::error::SignalError;

/// Change notifications for one subscription, in the order the source emits them.
///
/// The stream ends when the source drops the subscription.
pub type UpdateStream = Pin<Box<dyn Stream<Item = UpdateSnapshot> + Send>>;

/// Signal source (Driven Port)
///
/// Errors follow one rule: `NotFound`, `NotWritable` and `TypeMismatch`
/// describe the request, `Transport` describes the connection.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Current value of a signal.
    async fn get(&self, path: &SignalPath) -> Result<SignalValue, SignalError>;

    /// Write a signal.
    async fn set(&self, path: &SignalPath, value: Value) -> Result<(), SignalError>;

    /// Register for change notifications touching `path`.
    ///
    /// Returns once the source acknowledged the registration; updates are
    /// delivered later through the stream.
    async fn subscribe(&self, path: &SignalPath) -> Result<UpdateStream, SignalError>;

    /// Release the connection. Open update streams end.
    async fn disconnect(&self) {}
}
