use serde::{Deserialize, Serialize};
use std::fmt;

/// Local identity of a pad painter, stable for its lifetime.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PadId(uuid::Uuid);

impl PadId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create a PadId from a u128 (useful for tests).
    pub fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    pub fn to_uuid_string(&self) -> String {
        self.0.to_string()
    }
}

impl Default for PadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PadId({})", &self.0.to_string()[..8])
    }
}

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Server-side object identifier that correlates a painter with the
/// object it draws across redraws.
///
/// Painters derived from a primary painter get `"<primary>#<secondary>"`.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapId(String);

impl SnapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifier of a secondary painter derived from this one.
    pub fn derived(&self, secondary_key: &str) -> SnapId {
        SnapId(format!("{}#{}", self.0, secondary_key))
    }

    /// Part before the first `#`, i.e. the primary object id.
    pub fn primary(&self) -> &str {
        self.0.split('#').next().unwrap_or(&self.0)
    }
}

impl From<&str> for SnapId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SnapId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SnapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapId({})", self.0)
    }
}

impl fmt::Display for SnapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_keep_primary_prefix() {
        let id = SnapId::from("42");
        let palette = id.derived("palette");

        assert_eq!(palette.as_str(), "42#palette");
        assert_eq!(palette.primary(), "42");
        assert_eq!(palette.derived("axis").as_str(), "42#palette#axis");
    }

    #[test]
    fn snap_id_serializes_as_plain_string() {
        let json = serde_json::to_value(SnapId::from("7")).unwrap();
        assert_eq!(json, serde_json::json!("7"));
    }
}
