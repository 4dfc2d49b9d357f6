// telemetry-gate-broker/src/tool.rs
// ============================================================================
// Module: Tool Handle
// Description: Binds one configured telemetry tool to its artifact suffix
//              and the paired-file paths it is contracted to produce.
// Dependencies: telemetry-gate-core, telemetry-gate-providers
// ============================================================================

//! ## Overview
//! [`ToolHandle`] is the broker's unit of configuration, one per entry in
//! the comma-delimited tool list. It owns a
//! [`SubprocessTelemetryTool`] for the prepare/fetch subprocess contract and
//! knows where that tool's two parallel output files land, so callers never
//! need to re-derive `simple_telemetry<suffix>.json` / `telemetry<suffix>.json`
//! paths by hand.

use std::path::Path;
use std::path::PathBuf;

use telemetry_gate_core::interfaces::TelemetryTool;
use telemetry_gate_core::interfaces::TelemetryToolError;
use telemetry_gate_providers::SubprocessTelemetryTool;

/// One configured telemetry tool and the results directory it writes into.
#[derive(Debug, Clone)]
pub struct ToolHandle {
    tool: SubprocessTelemetryTool,
    results_dir: PathBuf,
}

impl ToolHandle {
    /// Binds `tool_path` (tagged with `suffix`) to `results_dir`.
    #[must_use]
    pub fn new(tool_path: impl Into<String>, suffix: impl Into<String>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool: SubprocessTelemetryTool::new(tool_path, suffix),
            results_dir: results_dir.into(),
        }
    }

    /// The artifact suffix distinguishing this tool from any other
    /// configured alongside it.
    #[must_use]
    pub fn suffix(&self) -> &str {
        self.tool.suffix()
    }

    /// Runs this tool's `--prepare` pass.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryToolError`] when the tool fails to spawn or exits
    /// outside its meaningful verdict band.
    pub fn prepare(&self, clear_cache: bool) -> Result<(), TelemetryToolError> {
        self.tool.prepare(&self.results_dir.to_string_lossy(), clear_cache)
    }

    /// Runs this tool's `--fetch` pass over `[start_ns, end_ns)`.
    /// The tool is responsible for writing its two parallel
    /// output files on success; this call does not itself read them.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryToolError`] when the tool fails to spawn, exits
    /// outside its meaningful verdict band, or violates line-count parity
    /// between its two output files.
    pub fn fetch(&self, start_ns: i64, end_ns: i64) -> Result<(), TelemetryToolError> {
        self.tool.fetch(&self.results_dir.to_string_lossy(), start_ns, end_ns)
    }

    /// Path to this tool's normalized-event file.
    #[must_use]
    pub fn simple_telemetry_path(&self) -> PathBuf {
        self.results_dir.join(format!("simple_telemetry{}.json", self.suffix()))
    }

    /// Path to this tool's native-representation file.
    #[must_use]
    pub fn telemetry_path(&self) -> PathBuf {
        self.results_dir.join(format!("telemetry{}.json", self.suffix()))
    }

    /// Path this tool's matcher pass should write matched native events to.
    #[must_use]
    pub fn matches_path(&self) -> PathBuf {
        self.results_dir.join(format!("matches{}.json", self.suffix()))
    }

    /// Path this tool's matcher pass should write the compact match string
    /// to.
    #[must_use]
    pub fn match_string_path(&self) -> PathBuf {
        self.results_dir.join(format!("match_string{}.txt", self.suffix()))
    }

    /// Path this tool's matcher pass should write its `ExtractState` record
    /// to.
    #[must_use]
    pub fn validate_summary_path(&self) -> PathBuf {
        self.results_dir.join(format!("validate_summary{}.json", self.suffix()))
    }

    /// The results directory this tool is scoped to.
    #[must_use]
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_paired_paths_from_the_suffix() {
        let handle = ToolHandle::new("/opt/tool/agent", "_edr1", "/tmp/results");
        assert_eq!(handle.simple_telemetry_path(), Path::new("/tmp/results/simple_telemetry_edr1.json"));
        assert_eq!(handle.telemetry_path(), Path::new("/tmp/results/telemetry_edr1.json"));
        assert_eq!(handle.matches_path(), Path::new("/tmp/results/matches_edr1.json"));
        assert_eq!(handle.match_string_path(), Path::new("/tmp/results/match_string_edr1.txt"));
        assert_eq!(handle.validate_summary_path(), Path::new("/tmp/results/validate_summary_edr1.json"));
    }
}
