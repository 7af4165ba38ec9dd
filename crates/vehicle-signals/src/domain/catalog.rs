//! Signal catalog.
//!
//! Declares, for every known signal, its data type and whether it may be
//! written. The broker consults the catalog on every request.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::path::SignalPath;
use super::value::{DataType, Value};
use crate::error::SignalError;

/// Well-known signal paths.
pub mod paths {
    use super::SignalPath;

    pub const SPEED: &str = "Vehicle.Speed";
    pub const BRAKE_LIGHT: &str = "Vehicle.Body.Lights.IsBrakeOn";
    pub const LATITUDE: &str = "Vehicle.CurrentLocation.Latitude";
    pub const LONGITUDE: &str = "Vehicle.CurrentLocation.Longitude";

    #[must_use]
    pub fn speed() -> SignalPath {
        SignalPath::from_static(SPEED)
    }

    #[must_use]
    pub fn brake_light() -> SignalPath {
        SignalPath::from_static(BRAKE_LIGHT)
    }

    #[must_use]
    pub fn latitude() -> SignalPath {
        SignalPath::from_static(LATITUDE)
    }

    #[must_use]
    pub fn longitude() -> SignalPath {
        SignalPath::from_static(LONGITUDE)
    }
}

/// Role of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Read-only, reflects observed state.
    Sensor,
    /// Accepts writes to influence vehicle state.
    Actuator,
    /// Read-only, static configuration.
    Attribute,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sensor => "sensor",
            Self::Actuator => "actuator",
            Self::Attribute => "attribute",
        };
        f.write_str(name)
    }
}

/// Catalog entry for one signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub path: SignalPath,
    pub data_type: DataType,
    pub kind: EntryKind,
    pub unit: Option<String>,
    pub description: String,
}

impl SignalMetadata {
    pub fn new(path: SignalPath, data_type: DataType, kind: EntryKind) -> Self {
        Self {
            path,
            data_type,
            kind,
            unit: None,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Only actuators accept writes from applications.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.kind == EntryKind::Actuator
    }
}

/// Lookup table from path to metadata.
#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    entries: HashMap<SignalPath, SignalMetadata>,
}

impl SignalCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The signals this application works with.
    ///
    /// Location coordinates are sensors: writing them is rejected.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with(
                SignalMetadata::new(paths::speed(), DataType::Float, EntryKind::Sensor)
                    .unit("km/h")
                    .description("Vehicle speed."),
            )
            .with(
                SignalMetadata::new(paths::brake_light(), DataType::Boolean, EntryKind::Actuator)
                    .description("Is brake light on. True = On. False = Off."),
            )
            .with(
                SignalMetadata::new(paths::latitude(), DataType::Double, EntryKind::Sensor)
                    .unit("degrees")
                    .description("Current latitude of vehicle in WGS 84 geodetic coordinates."),
            )
            .with(
                SignalMetadata::new(paths::longitude(), DataType::Double, EntryKind::Sensor)
                    .unit("degrees")
                    .description("Current longitude of vehicle in WGS 84 geodetic coordinates."),
            )
    }

    /// Add an entry, builder style. Replaces an existing entry for the same path.
    #[must_use]
    pub fn with(mut self, metadata: SignalMetadata) -> Self {
        self.insert(metadata);
        self
    }

    /// Add an entry, returning the one it replaced.
    pub fn insert(&mut self, metadata: SignalMetadata) -> Option<SignalMetadata> {
        self.entries.insert(metadata.path.clone(), metadata)
    }

    #[must_use]
    pub fn get(&self, path: &SignalPath) -> Option<&SignalMetadata> {
        self.entries.get(path)
    }

    /// Metadata for `path`, or `NotFound`.
    pub fn lookup(&self, path: &SignalPath) -> Result<&SignalMetadata, SignalError> {
        self.entries
            .get(path)
            .ok_or_else(|| SignalError::NotFound { path: path.clone() })
    }

    /// Check that `value` has the declared type of `path`.
    pub fn check_type(&self, path: &SignalPath, value: &Value) -> Result<&SignalMetadata, SignalError> {
        let metadata = self.lookup(path)?;
        let actual = value.data_type();
        if actual != metadata.data_type {
            return Err(SignalError::TypeMismatch {
                path: path.clone(),
                expected: metadata.data_type,
                actual,
                value: value.clone(),
            });
        }
        Ok(metadata)
    }

    /// Check an application write: known path, writable, matching type.
    pub fn check_write(&self, path: &SignalPath, value: &Value) -> Result<&SignalMetadata, SignalError> {
        let metadata = self.lookup(path)?;
        if !metadata.is_writable() {
            return Err(SignalError::NotWritable {
                path: path.clone(),
                kind: metadata.kind,
            });
        }
        self.check_type(path, value)
    }

    /// All known paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<SignalPath> {
        let mut paths: Vec<_> = self.entries.keys().cloned().collect();
        paths.sort();
        paths
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog() {
        let catalog = SignalCatalog::standard();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.lookup(&paths::brake_light()).unwrap().is_writable());
        assert!(!catalog.lookup(&paths::speed()).unwrap().is_writable());
        assert_eq!(
            catalog.lookup(&paths::speed()).unwrap().unit.as_deref(),
            Some("km/h")
        );
    }

    #[test]
    fn test_unknown_path() {
        let catalog = SignalCatalog::standard();
        let path = SignalPath::new("Vehicle.Cabin.Horn").unwrap();
        assert_eq!(
            catalog.lookup(&path).unwrap_err(),
            SignalError::NotFound { path }
        );
    }

    #[test]
    fn test_check_write_type_mismatch() {
        let catalog = SignalCatalog::standard();
        let err = catalog
            .check_write(&paths::brake_light(), &Value::Float(1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            SignalError::TypeMismatch {
                expected: DataType::Boolean,
                actual: DataType::Float,
                ..
            }
        ));
    }

    #[test]
    fn test_location_is_not_writable() {
        let catalog = SignalCatalog::standard();
        for path in [paths::latitude(), paths::longitude()] {
            let err = catalog.check_write(&path, &Value::Double(48.1)).unwrap_err();
            assert_eq!(
                err,
                SignalError::NotWritable {
                    path,
                    kind: EntryKind::Sensor
                }
            );
        }
    }

    #[test]
    fn test_writable_when_catalog_says_so() {
        let catalog = SignalCatalog::standard().with(SignalMetadata::new(
            paths::latitude(),
            DataType::Double,
            EntryKind::Actuator,
        ));
        assert!(catalog.check_write(&paths::latitude(), &Value::Double(48.1)).is_ok());
    }

    #[test]
    fn test_check_type_ignores_writability() {
        let catalog = SignalCatalog::standard();
        assert!(catalog.check_type(&paths::speed(), &Value::Float(10.0)).is_ok());
        assert!(catalog.check_type(&paths::speed(), &Value::Double(10.0)).is_err());
    }
}
