// telemetry-gate-core/src/planner/mod.rs
// ============================================================================
// Module: Test Planner
// Description: Selector parsing, test-set resolution, and argument
//              interpolation.
// ============================================================================

pub mod interpolate;
pub mod selector;

pub use interpolate::HostInfo;
pub use interpolate::ServerEntry;
pub use interpolate::ServerTable;
pub use interpolate::interpolate;
pub use selector::PlannedTest;
pub use selector::Selector;
pub use selector::plan_tests;

use thiserror::Error;

/// Errors surfaced while planning or interpolating a batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlannerError {
    /// A selector string did not match the accepted grammar.
    #[error("unrecognised selector: {0}")]
    BadSelector(String),
    /// An interpolation token referenced an argument that was never
    /// resolved.
    #[error("unresolved interpolation token: {0}")]
    UnresolvedToken(String),
    /// A `$SERVER[...]` reference named a server id/type not present in the
    /// server table.
    #[error("unknown server reference: {0}")]
    UnknownServer(String),
}
