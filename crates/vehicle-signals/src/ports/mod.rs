//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driven Ports (outbound) - the signal broker this crate talks to
//! - Driving Ports (inbound) - handlers that react to signal changes

pub mod inbound;
pub mod outbound;

pub use inbound::SignalHandler;
pub use outbound::{SignalSource, UpdateStream};
