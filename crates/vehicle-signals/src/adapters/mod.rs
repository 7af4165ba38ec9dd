//! Adapters Layer
//!
//! Implementations of the outbound ports.

pub mod databroker;

pub use databroker::InMemoryDatabroker;
