// telemetry-gate-core/src/loader/mod.rs
// ============================================================================
// Module: Catalog & Criteria Loader
// Description: Parses the atomic catalog and expected-evidence criteria,
//              then joins them into runnable test records.
// Dependencies: serde_yaml, crate::model
// ============================================================================

//! ## Overview
//! Loading happens in three independent passes — catalog index, catalog
//! YAML, and criteria CSV — each of which validates its own invariants
//! before the [`join`] step resolves `ExpectedEvidence` blocks against
//! `TestCase`s. A malformed row is logged and skipped rather than failing
//! the whole load.

pub mod catalog;
pub mod criteria;
pub mod join;

pub use catalog::CatalogIndexRow;
pub use catalog::load_catalog_index;
pub use catalog::load_technique_yaml;
pub use criteria::CriteriaWarning;
pub use criteria::load_criteria_file;
pub use join::JoinedTest;
pub use join::JoinOutcome;
pub use join::join_catalog_and_criteria;

use thiserror::Error;

/// Errors surfaced while loading the catalog or criteria.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The catalog index file could not be read.
    #[error("failed to read catalog index {path}: {source}")]
    IndexRead {
        /// Path of the index file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A technique YAML file could not be read.
    #[error("failed to read technique catalog {path}: {source}")]
    YamlRead {
        /// Path of the YAML file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A technique YAML file did not parse as the expected schema.
    #[error("failed to parse technique catalog {path}: {source}")]
    YamlParse {
        /// Path of the YAML file.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },
    /// A criteria file could not be read.
    #[error("failed to read criteria file {path}: {source}")]
    CriteriaRead {
        /// Path of the criteria file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The criteria directory itself is missing, which is unrecoverable.
    #[error("criteria directory not found: {0}")]
    CriteriaDirMissing(String),
}
