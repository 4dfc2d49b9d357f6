// telemetry-gate-cli/src/bin/goartrun.rs
// ============================================================================
// Binary: goartrun
// Description: Standalone single-RunSpec lifecycle invocation. Reads a
//              GoartConfig, runs prereq/test/cleanup, writes run_summary.json.
// Dependencies: telemetry-gate-core, telemetry-gate-config, telemetry-gate-runner
// ============================================================================

//! `goartrun --config <path|->` is the process `harness` spawns once per
//! planned test, and is also a documented standalone entry
//! point for running a single `GoartConfig` outside a batch. It owns no
//! selection, planning, or matcher logic — only the prereq/test/cleanup
//! lifecycle a single `RunSpec` names.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use telemetry_gate_cli::goart;
use telemetry_gate_cli::report::write_stderr_line;
use telemetry_gate_core::model::RunResult;
use telemetry_gate_core::model::TestStatus;
use telemetry_gate_runner::StageTimeouts;
use telemetry_gate_runner::execute_lifecycle;

/// Runs the prereq/test/cleanup lifecycle for one `GoartConfig`.
#[derive(Debug, Parser)]
#[command(name = "goartrun", about = "Runs one telemetry-gate RunSpec lifecycle")]
struct Args {
    /// Path to a `GoartConfig` JSON file, or `-` to read it from stdin.
    #[arg(long)]
    config: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = match goart::read_config(&args.config) {
        Ok(config) => config,
        Err(err) => {
            write_stderr_line(&format!("goartrun: failed to read config: {err}"));
            return ExitCode::from(TestStatus::InvalidArgs as u8);
        }
    };

    let timeouts = stage_timeouts(&config);
    let temp_root = Path::new(&config.spec.temp_dir).to_path_buf();
    let results_dir = Path::new(&config.spec.results_dir).to_path_buf();

    let result = match execute_lifecycle(
        &config.spec,
        &temp_root,
        config.rand_suffix,
        timeouts,
        &config.test_command,
        config.cleanup_command.as_deref(),
        config.comment.clone(),
    ) {
        Ok(result) => result,
        Err(err) => {
            write_stderr_line(&format!("goartrun: {err}"));
            RunResult {
                test_id: format!("{}_{}", config.spec.technique_id.as_str(), config.spec.test_index),
                stages: vec![],
                status: TestStatus::RunnerFail,
                start_ns: 0,
                end_ns: 0,
                is_cleaned_up: false,
                comment: Some(err.to_string()),
            }
        }
    };

    let exit_code = result.status as u8;
    if let Err(err) = write_summary(&results_dir, &result) {
        write_stderr_line(&format!("goartrun: failed to write run_summary.json: {err}"));
        return ExitCode::from(TestStatus::RunnerFail as u8);
    }
    ExitCode::from(exit_code)
}

fn stage_timeouts(config: &goart::GoartConfig) -> StageTimeouts {
    let loaded = telemetry_gate_config::load_config(None).ok();
    let prereq_secs = loaded.as_ref().map_or(60, |c| c.runner.prereq_timeout_secs);
    let cleanup_secs = loaded.as_ref().map_or(60, |c| c.runner.cleanup_timeout_secs);
    StageTimeouts {
        prereq: Duration::from_secs(prereq_secs),
        test: Duration::from_secs(config.spec.timeout_secs),
        cleanup: Duration::from_secs(cleanup_secs),
    }
}

fn write_summary(results_dir: &Path, result: &RunResult) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(results_dir)?;
    let json = serde_json::to_string_pretty(result)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(goart::run_summary_path(results_dir), json)
}
