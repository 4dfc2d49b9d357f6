// telemetry-gate-core/src/interfaces.rs
// ============================================================================
// Module: Plugin-Shaped Interfaces
// Description: Backend-agnostic traits implemented by the providers, broker,
//              and runner crates; telemetry-gate-core depends only on these.
// Dependencies: crate::model
// ============================================================================

//! Three plugin-shaped interfaces with a fixed closed set of implementations
//! today: `HostInfoProvider`, `TelemetryTool`, and `RunRecordStore`. Small,
//! synchronous-looking trait surfaces that downstream crates implement
//! against concrete I/O.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::RunResult;
use crate::model::TestStatus;
use crate::planner::HostInfo;
use crate::planner::ServerTable;

/// Error returned by a [`HostInfoProvider`].
#[derive(Debug, Error)]
pub enum HostInfoError {
    /// The underlying OS command used to collect host facts failed.
    #[error("failed to collect host info: {0}")]
    CollectionFailed(String),
}

/// Collects ambient host facts once at startup. Implementations may shell
/// out to `hostname`, `ip addr`, `ifconfig`, or read OS APIs directly.
pub trait HostInfoProvider {
    /// Collects the full set of host facts used by interpolation.
    ///
    /// # Errors
    ///
    /// Returns [`HostInfoError`] when collection fails outright; partial
    /// results (some fields empty) are not an error.
    fn collect(&self) -> Result<HostInfo, HostInfoError>;

    /// Loads the server table from `servers.csv`, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`HostInfoError`] when the file is configured but unreadable.
    fn load_servers(&self, path: Option<&str>) -> Result<ServerTable, HostInfoError>;
}

/// Error returned by a [`TelemetryTool`].
#[derive(Debug, Error)]
pub enum TelemetryToolError {
    /// The tool process could not be spawned.
    #[error("failed to spawn telemetry tool {path}: {source}")]
    Spawn {
        /// Configured tool path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The tool exited with a status in the fail band.
    #[error("telemetry tool {path} exited with status {status}")]
    ToolFailed {
        /// Configured tool path.
        path: String,
        /// The exit status, mapped to `TestStatus` where possible.
        status: TestStatus,
    },
    /// The tool's parallel output files were not line-for-line aligned.
    #[error("telemetry tool {path} violated parallel-file parity: {detail}")]
    ParityViolation {
        /// Configured tool path.
        path: String,
        /// Human-readable description of the mismatch.
        detail: String,
    },
}

/// An external telemetry tool, invoked twice per harness session (prepare,
/// fetch).
pub trait TelemetryTool {
    /// Configured suffix distinguishing this tool's artifacts from others
    /// run in the same session.
    fn suffix(&self) -> &str;

    /// Runs the tool's `--prepare` pass before any test executes.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryToolError`] when the process fails to spawn or
    /// exits in the fail band.
    fn prepare(&self, results_dir: &str, clear_cache: bool) -> Result<(), TelemetryToolError>;

    /// Runs the tool's `--fetch` pass after the batch completes, over the
    /// half-open nanosecond window `[start_ns, end_ns)`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryToolError`] on spawn failure, fail-band exit, or
    /// parallel-file parity violation.
    fn fetch(&self, results_dir: &str, start_ns: i64, end_ns: i64) -> Result<(), TelemetryToolError>;
}

/// Error returned by a [`RunRecordStore`].
#[derive(Debug, Error)]
pub enum RunRecordStoreError {
    /// The underlying storage medium (filesystem, database) rejected the
    /// operation.
    #[error("run record store error: {0}")]
    Backend(String),
}

/// Persists per-test run results and the batch-level status table. The
/// CLI's `state`/`report` modules implement this against a filesystem
/// layout; a future implementation could target a database without
/// changing the orchestration loop.
pub trait RunRecordStore {
    /// Persists one test's final result.
    ///
    /// # Errors
    ///
    /// Returns [`RunRecordStoreError`] on a backend failure.
    fn record_result(&mut self, result: &RunResult) -> Result<(), RunRecordStoreError>;

    /// Reads back all results recorded so far in this run (used by
    /// retry/revalidate planning).
    ///
    /// # Errors
    ///
    /// Returns [`RunRecordStoreError`] on a backend failure.
    fn load_prior_results(&self) -> Result<Vec<RunResult>, RunRecordStoreError>;

    /// Writes the final batch tally keyed by `TestStatus` short name.
    ///
    /// # Errors
    ///
    /// Returns [`RunRecordStoreError`] on a backend failure.
    fn write_tally(&mut self, tally: &BTreeMap<&'static str, usize>) -> Result<(), RunRecordStoreError>;
}
