//! Signal paths.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

/// Separator between the segments of a path.
pub const SEPARATOR: char = '.';

/// An immutable, dotted, hierarchical signal identifier such as
/// `Vehicle.Body.Lights.IsBrakeOn`.
///
/// Equality is structural. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignalPath(Arc<str>);

impl SignalPath {
    /// Parse and validate a path.
    ///
    /// Every segment must be non-empty and consist of ASCII letters, digits
    /// or underscores.
    pub fn new(path: impl AsRef<str>) -> Result<Self, SignalError> {
        let path = path.as_ref();
        match invalid_reason(path) {
            Some(reason) => Err(SignalError::InvalidPath {
                path: path.to_string(),
                reason,
            }),
            None => Ok(Self(Arc::from(path))),
        }
    }

    /// Build a path from a literal known to be well-formed.
    ///
    /// Only for compile-time constants; checked in debug builds.
    #[must_use]
    pub fn from_static(path: &'static str) -> Self {
        debug_assert!(invalid_reason(path).is_none(), "malformed path literal {path:?}");
        Self(Arc::from(path))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path segments from root to leaf.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The last segment.
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// The enclosing branch, or `None` for a root path.
    #[must_use]
    pub fn parent(&self) -> Option<SignalPath> {
        self.0
            .rfind(SEPARATOR)
            .map(|idx| Self(Arc::from(&self.0[..idx])))
    }

    /// Append a segment.
    pub fn child(&self, segment: &str) -> Result<SignalPath, SignalError> {
        Self::new(format!("{}{}{}", self.0, SEPARATOR, segment))
    }

    /// Whether `self` lies strictly below `branch`.
    #[must_use]
    pub fn is_descendant_of(&self, branch: &SignalPath) -> bool {
        self.0.len() > branch.0.len()
            && self.0.starts_with(&*branch.0)
            && self.0[branch.0.len()..].starts_with(SEPARATOR)
    }
}

fn invalid_reason(path: &str) -> Option<&'static str> {
    if path.is_empty() {
        return Some("path is empty");
    }
    for segment in path.split(SEPARATOR) {
        if segment.is_empty() {
            return Some("empty segment");
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Some("segments may only contain letters, digits and '_'");
        }
    }
    None
}

impl fmt::Display for SignalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SignalPath {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SignalPath {
    type Error = SignalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SignalPath> for String {
    fn from(path: SignalPath) -> Self {
        path.0.to_string()
    }
}

impl AsRef<str> for SignalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let path = SignalPath::new("Vehicle.Body.Lights.IsBrakeOn").unwrap();
        assert_eq!(path.depth(), 4);
        assert_eq!(path.leaf(), "IsBrakeOn");
        assert_eq!(
            path.segments().collect::<Vec<_>>(),
            vec!["Vehicle", "Body", "Lights", "IsBrakeOn"]
        );
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", ".", "Vehicle.", ".Speed", "Vehicle..Speed", "Vehicle.Sp eed", "Vehicle/Speed"] {
            assert!(
                matches!(SignalPath::new(bad), Err(SignalError::InvalidPath { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_structural_equality() {
        let a = SignalPath::new("Vehicle.Speed").unwrap();
        let b: SignalPath = "Vehicle.Speed".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, SignalPath::from_static("Vehicle.Speed"));
    }

    #[test]
    fn test_hierarchy() {
        let lat = SignalPath::new("Vehicle.CurrentLocation.Latitude").unwrap();
        let branch = lat.parent().unwrap();
        assert_eq!(branch.as_str(), "Vehicle.CurrentLocation");
        assert!(lat.is_descendant_of(&branch));
        assert!(!branch.is_descendant_of(&lat));

        // Prefix of a segment is not an ancestor
        let current = SignalPath::new("Vehicle.Current").unwrap();
        assert!(!lat.is_descendant_of(&current));

        assert_eq!(branch.child("Longitude").unwrap().leaf(), "Longitude");
        assert!(SignalPath::new("Vehicle").unwrap().parent().is_none());
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let path = SignalPath::new("Vehicle.Speed").unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#""Vehicle.Speed""#);

        let bad: Result<SignalPath, _> = serde_json::from_str(r#""Vehicle..Speed""#);
        assert!(bad.is_err());
    }
}
