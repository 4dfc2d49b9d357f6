// telemetry-gate-core/src/matcher/mod.rs
// ============================================================================
// Module: Matcher
// Description: Per-(TestRun x tool) evidence matching: attribution window,
//              field-predicate evaluation, correlation checks, and coverage.
// ============================================================================

pub mod attribution;
pub mod comparator;
pub mod coverage;

pub use attribution::AttributionGates;
pub use attribution::RunnerMarker;
pub use coverage::ExtractState;
pub use coverage::MatchVerdict;
pub use coverage::run_matcher_pass;

use thiserror::Error;

/// Errors surfaced by the matcher. These are rare: most "no match" results
/// are expressed through [`coverage::ExtractState`] rather than an error,
/// since an event simply not matching anything is the common case, not a
/// failure.
#[derive(Debug, Error)]
pub enum MatcherError {
    /// A netflow sub-kind pattern failed to compile as a regex.
    #[error("invalid netflow pattern {0}: {1}")]
    BadNetflowPattern(String, regex::Error),
    /// A regex-operator field predicate failed to compile.
    #[error("invalid predicate regex {0}: {1}")]
    BadPredicateRegex(String, regex::Error),
}
