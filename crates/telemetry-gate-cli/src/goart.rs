// telemetry-gate-cli/src/goart.rs
// ============================================================================
// Module: Goart Invocation Contract
// Description: The JSON config shape `harness` writes and `goartrun` reads
//              for one standalone test-lifecycle invocation.
// Dependencies: telemetry-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! This module documents `goartrun --config <path|->` as a standalone
//! runner invocation. The harness uses that same contract internally,
//! spawning one `goartrun` child per planned test rather than calling
//! `telemetry_gate_runner::execute_lifecycle` in its own process, so a
//! crashing or hung test script can never take the orchestrator down with
//! it.

use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use telemetry_gate_core::model::RunSpec;

/// Everything a `goartrun` invocation needs beyond what `RunSpec` itself
/// carries: the already-interpolated command text (interpolation needs
/// host/server facts that are a harness-side concern) and the working-set
/// randomizer the harness chose so it can independently compute the same
/// working-directory path for attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoartConfig {
    /// The resolved run plan for one test.
    pub spec: RunSpec,
    /// Fully interpolated, comment-stripped test command.
    pub test_command: String,
    /// Fully interpolated, comment-stripped cleanup command, if any.
    pub cleanup_command: Option<String>,
    /// Trailing comment stripped from the test command, carried through to
    /// `run_summary.json` verbatim.
    pub comment: Option<String>,
    /// Random suffix for this test's working directory, chosen by the
    /// harness so it can be reproduced for attribution without round-tripping
    /// it back out of `goartrun`.
    pub rand_suffix: u64,
}

/// Reads a [`GoartConfig`] from a file path, or from stdin when `source` is
/// `"-"`.
///
/// # Errors
///
/// Returns an error if the source cannot be read or does not parse as a
/// [`GoartConfig`].
pub fn read_config(source: &str) -> Result<GoartConfig, std::io::Error> {
    let contents = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)?
    };
    serde_json::from_str(&contents).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// The `run_summary.json` filename written by `goartrun` into
/// `spec.results_dir`.
#[must_use]
pub fn run_summary_path(results_dir: &Path) -> PathBuf {
    Path::new(results_dir).join("run_summary.json")
}

/// Resolves the `goartrun` binary to invoke: an explicit `--goartpath`
/// override, falling back to a `goartrun` binary alongside the running
/// `harness` executable.
#[must_use]
pub fn default_goart_path() -> PathBuf {
    let exe_name = if cfg!(windows) { "goartrun.exe" } else { "goartrun" };
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .map(|dir| dir.join(exe_name))
        .unwrap_or_else(|| PathBuf::from(exe_name))
}
