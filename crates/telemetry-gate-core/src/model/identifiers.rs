// telemetry-gate-core/src/model/identifiers.rs
// ============================================================================
// Module: Telemetry Gate Identifiers
// Description: Canonical opaque identifiers for techniques, tests, and runs.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! Opaque identifier newtypes used across the catalog, planner, and matcher.
//! Validation (format, length) happens at the loader boundary; these wrappers
//! are intentionally permissive so that malformed catalog data surfaces as a
//! loader error rather than a panic deep in a newtype constructor.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// MITRE ATT&CK technique identifier, e.g. `T1027.002`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechniqueId(String);

impl TechniqueId {
    /// Creates a new technique identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the parent technique (everything before the first `.`), or
    /// `self` when there is no sub-technique suffix.
    #[must_use]
    pub fn root(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TechniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TechniqueId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TechniqueId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// 128-bit test GUID, stored in its canonical hyphenated lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestGuid(String);

impl TestGuid {
    /// Creates a new test GUID, lower-casing it for stable comparisons.
    #[must_use]
    pub fn new(guid: impl Into<String>) -> Self {
        Self(guid.into().to_ascii_lowercase())
    }

    /// Returns the GUID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 8 hex characters, the "short form" used in criteria
    /// rows and in attribution-window marker paths.
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }

    /// True when `prefix` (case-insensitive) is a prefix of this GUID of at
    /// least 8 hex characters.
    #[must_use]
    pub fn matches_short_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.to_ascii_lowercase();
        prefix.len() >= 8 && self.0.starts_with(&prefix)
    }
}

impl fmt::Display for TestGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TestGuid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TestGuid {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifies either a 1-based test index or a short/full GUID, the two
/// forms that share a single column in both catalog and criteria rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestIndexOrGuid {
    /// 1-based position of the test within its technique.
    Index(u32),
    /// Full or short-prefix GUID.
    Guid(TestGuid),
}

impl TestIndexOrGuid {
    /// Parses a criteria-row cell into an index or GUID: length >= 8 and
    /// hex-alphabet content means GUID, otherwise a 1-based integer.
    #[must_use]
    pub fn parse(cell: &str) -> Option<Self> {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() >= 8 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(Self::Guid(TestGuid::new(trimmed)));
        }
        trimmed.parse::<u32>().ok().map(Self::Index)
    }
}

/// Working directory / results directory namespacing key: `(TechniqueId,
/// TestIndex)` or `(TechniqueId, TestGuid)`, whichever the test was resolved
/// by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestKey {
    /// Owning technique.
    pub technique_id: TechniqueId,
    /// 1-based index within the technique.
    pub test_index: u32,
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.technique_id, self.test_index)
    }
}
