//! Domain Layer
//!
//! Signal paths, typed values, update snapshots and the signal catalog.
//! Nothing in here performs I/O.

pub mod catalog;
pub mod path;
pub mod snapshot;
pub mod value;
