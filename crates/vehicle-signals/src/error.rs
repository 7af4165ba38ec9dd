//! Error types for the vehicle signal layer

use thiserror::Error;

use crate::domain::catalog::EntryKind;
use crate::domain::path::SignalPath;
use crate::domain::value::{DataType, Value};

/// Errors that can occur while talking to the signal source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignalError {
    #[error("Invalid signal path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Signal not found: {path}")]
    NotFound { path: SignalPath },

    #[error("Signal {path} is not writable ({kind})")]
    NotWritable { path: SignalPath, kind: EntryKind },

    #[error("Type mismatch on {path}: expected {expected}, got {actual} (value {value})")]
    TypeMismatch {
        path: SignalPath,
        expected: DataType,
        actual: DataType,
        value: Value,
    },

    #[error("Duplicate subscription for {path}")]
    DuplicateSubscription { path: SignalPath },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl SignalError {
    /// Connectivity failure towards the signal source.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Invalid use of a signal (unknown path, read-only path, wrong type).
    ///
    /// These are recovered where they occur; the caller keeps going.
    #[must_use]
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::NotWritable { .. } | Self::TypeMismatch { .. }
        )
    }

    /// The path the error refers to, when there is one.
    #[must_use]
    pub fn path(&self) -> Option<&SignalPath> {
        match self {
            Self::NotFound { path }
            | Self::NotWritable { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::DuplicateSubscription { path } => Some(path),
            Self::InvalidPath { .. } | Self::Transport(_) => None,
        }
    }
}
