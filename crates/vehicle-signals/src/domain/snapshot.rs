//! Update snapshots.

use std::sync::Arc;

use super::path::SignalPath;
use super::value::{SignalValue, Value};

/// An immutable batch of values delivered together by one change notification.
///
/// A snapshot may carry one path or several (latitude and longitude may
/// arrive together or separately), so consumers look values up by path.
/// Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSnapshot {
    entries: Arc<[SignalValue]>,
}

impl UpdateSnapshot {
    pub fn new(entries: Vec<SignalValue>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn single(entry: SignalValue) -> Self {
        Self::new(vec![entry])
    }

    /// The entry for `path`. If a path occurs more than once, the last entry wins.
    #[must_use]
    pub fn get(&self, path: &SignalPath) -> Option<&SignalValue> {
        self.entries.iter().rev().find(|e| &e.path == path)
    }

    /// Shorthand for the value of `path`.
    #[must_use]
    pub fn value(&self, path: &SignalPath) -> Option<&Value> {
        self.get(path).map(|e| &e.value)
    }

    #[must_use]
    pub fn contains(&self, path: &SignalPath) -> bool {
        self.entries.iter().any(|e| &e.path == path)
    }

    /// Paths in delivery order.
    pub fn paths(&self) -> impl Iterator<Item = &SignalPath> {
        self.entries.iter().map(|e| &e.path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalValue> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<SignalValue> for UpdateSnapshot {
    fn from_iter<I: IntoIterator<Item = SignalValue>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
