// telemetry-gate-providers/src/tool.rs
// ============================================================================
// Module: Subprocess Telemetry Tool
// Description: Invokes an external telemetry agent binary twice per harness
//              session, per its prepare/fetch contract.
// Purpose: Concrete TelemetryTool backend; the orchestration crates never
//          spawn a process directly.
// Dependencies: telemetry-gate-core
// ============================================================================

//! ## Overview
//! A tool is configured by its binary path and a suffix distinguishing its
//! artifacts from any other tool run in the same session (`telemetry_x.json`
//! for suffix `_x`, etc.). Exit codes in `[ToolFail, Validated]` are
//! meaningful verdicts; anything else is treated as a hard spawn/tool
//! failure.

use std::process::Command;

use telemetry_gate_core::interfaces::TelemetryTool;
use telemetry_gate_core::interfaces::TelemetryToolError;
use telemetry_gate_core::model::TestStatus;

/// A telemetry agent invoked as a child process.
#[derive(Debug, Clone)]
pub struct SubprocessTelemetryTool {
    /// Path to the tool binary.
    path: String,
    /// Suffix appended to this tool's artifact filenames, e.g. `_edr1`.
    suffix: String,
}

impl SubprocessTelemetryTool {
    /// Creates a tool bound to `path`, with artifacts tagged by `suffix`.
    #[must_use]
    pub fn new(path: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            suffix: suffix.into(),
        }
    }

    fn run(&self, args: &[String]) -> Result<TestStatus, TelemetryToolError> {
        let output = Command::new(&self.path)
            .args(args)
            .output()
            .map_err(|source| TelemetryToolError::Spawn {
                path: self.path.clone(),
                source,
            })?;
        let code = output.status.code().unwrap_or(1);
        Ok(TestStatus::from_code(code))
    }
}

impl TelemetryTool for SubprocessTelemetryTool {
    fn suffix(&self) -> &str {
        &self.suffix
    }

    fn prepare(&self, results_dir: &str, clear_cache: bool) -> Result<(), TelemetryToolError> {
        let mut args = vec!["--prepare".to_string()];
        if clear_cache {
            args.push("--clearcache".to_string());
        }
        args.push("--resultsdir".to_string());
        args.push(results_dir.to_string());
        args.push("--suffix".to_string());
        args.push(self.suffix.clone());

        let status = self.run(&args)?;
        if status != TestStatus::Unknown && !status.is_tool_verdict_band() {
            return Err(TelemetryToolError::ToolFailed {
                path: self.path.clone(),
                status,
            });
        }
        Ok(())
    }

    fn fetch(&self, results_dir: &str, start_ns: i64, end_ns: i64) -> Result<(), TelemetryToolError> {
        let args = vec![
            "--fetch".to_string(),
            "--resultsdir".to_string(),
            results_dir.to_string(),
            "--ts".to_string(),
            format!("{start_ns},{end_ns}"),
        ];

        let status = self.run(&args)?;
        if status != TestStatus::Unknown && !status.is_tool_verdict_band() {
            return Err(TelemetryToolError::ToolFailed {
                path: self.path.clone(),
                status,
            });
        }
        check_parallel_file_parity(results_dir, &self.suffix)
    }
}

/// Verifies the two parallel output files have the same line count, per
/// the tool's output contract. Missing files are tolerated here
/// (a tool that produced nothing is a `NoTelemetry` matcher outcome, not a
/// parity violation); only a *line-count mismatch between two present
/// files* is fatal.
fn check_parallel_file_parity(results_dir: &str, suffix: &str) -> Result<(), TelemetryToolError> {
    let simple_path = format!("{results_dir}/simple_telemetry{suffix}.json");
    let native_path = format!("{results_dir}/telemetry{suffix}.json");

    let (Ok(simple), Ok(native)) = (
        std::fs::read_to_string(&simple_path),
        std::fs::read_to_string(&native_path),
    ) else {
        return Ok(());
    };

    let simple_lines = simple.lines().count();
    let native_lines = native.lines().count();
    if simple_lines != native_lines {
        return Err(TelemetryToolError::ParityViolation {
            path: native_path,
            detail: format!("{simple_lines} simple-telemetry lines vs {native_lines} native lines"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_reported() {
        let tool = SubprocessTelemetryTool::new("/usr/bin/edr-agent", "_x");
        assert_eq!(tool.suffix(), "_x");
    }

    #[test]
    fn missing_binary_yields_spawn_error() {
        let tool = SubprocessTelemetryTool::new("/definitely/not/a/real/binary", "_x");
        let err = tool.prepare("/tmp/results", false).unwrap_err();
        assert!(matches!(err, TelemetryToolError::Spawn { .. }));
    }

    #[test]
    fn parity_check_passes_when_files_absent() {
        assert!(check_parallel_file_parity("/tmp/definitely-missing-dir", "_x").is_ok());
    }

    #[test]
    fn parity_check_fails_on_line_mismatch() {
        let dir = std::env::temp_dir().join(format!(
            "telemetry-gate-parity-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("simple_telemetry_x.json"), "{}\n{}\n").unwrap();
        std::fs::write(dir.join("telemetry_x.json"), "{}\n").unwrap();

        let dir_str = dir.to_string_lossy().to_string();
        let err = check_parallel_file_parity(&dir_str, "_x").unwrap_err();
        assert!(matches!(err, TelemetryToolError::ParityViolation { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
