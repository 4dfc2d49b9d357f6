// telemetry-gate-runner/src/stage.rs
// ============================================================================
// Module: Stage Sequencer
// Description: Runs the prereq/test/cleanup lifecycle for one RunSpec.
// Dependencies: telemetry-gate-core
// ============================================================================

//! ## Overview
//! [`execute_lifecycle`] runs the three stages in order: `prereq` (abort the
//! whole run on failure), `test` (the body under observation), `cleanup`
//! (best-effort, failures are warnings only). The caller supplies the
//! already-interpolated command text for `test` and `cleanup` —
//! interpolation needs host/server facts that live outside this crate's
//! scope — along with the trailing comment stripped by
//! [`crate::script::strip_hash_comment`] so it can be carried into
//! `run_summary.json` without re-parsing the command.

use std::process::Command;
use std::time::Duration;

use telemetry_gate_core::model::RunResult;
use telemetry_gate_core::model::RunSpec;
use telemetry_gate_core::model::Stage;
use telemetry_gate_core::model::StageResult;
use thiserror::Error;

use crate::deadline::run_with_deadline;
use crate::privilege::resolve_unprivileged_user;
use crate::workdir::WorkDirGuard;

/// Errors that abort a run outright (as opposed to a failed stage, which is
/// recorded in the result and does not stop the batch).
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The working directory could not be created.
    #[error(transparent)]
    WorkDir(#[from] crate::workdir::WorkDirError),
    /// A script file could not be written to the working directory.
    #[error("failed to write script {path}: {source}")]
    ScriptWrite {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The executor kind was not recognised at execution time.
    #[error("unrecognised executor: {0}")]
    UnknownExecutor(String),
}

/// Chooses the interpreter invocation for `kind`.
#[must_use]
pub fn interpreter_for(kind: telemetry_gate_core::model::ExecutorKind) -> (&'static str, Vec<&'static str>) {
    use telemetry_gate_core::model::ExecutorKind;
    match kind {
        ExecutorKind::Bash => ("bash", vec![]),
        ExecutorKind::Sh => ("sh", vec![]),
        ExecutorKind::CommandPrompt => ("CMD", vec!["/c"]),
        ExecutorKind::Powershell => ("powershell", vec!["-ExecutionPolicy", "Bypass", "-NoProfile"]),
    }
}

/// Writes `command` to `dir/basename.ext` and returns the script path.
/// PowerShell scripts are prefixed with `$ErrorActionPreference = "Stop"` so
/// the first failing command halts the rest.
fn materialize_script(
    dir: &std::path::Path,
    basename: &str,
    kind: telemetry_gate_core::model::ExecutorKind,
    command: &str,
) -> Result<std::path::PathBuf, RunnerError> {
    use telemetry_gate_core::model::ExecutorKind;
    let extension = kind.script_extension();
    let path = dir.join(format!("{basename}.{extension}"));
    let contents = if matches!(kind, ExecutorKind::Powershell) {
        format!("$ErrorActionPreference = \"Stop\"\n{command}\n")
    } else {
        format!("{command}\n")
    };
    std::fs::write(&path, contents).map_err(|source| RunnerError::ScriptWrite {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

/// Runs one stage's script under its deadline, applying privilege drop when
/// `spec.username` is set and the platform is Unix.
fn run_stage_script(
    spec: &RunSpec,
    script_path: &std::path::Path,
    timeout: Duration,
) -> std::io::Result<crate::deadline::DeadlineOutcome> {
    let (interpreter, leading_args) = interpreter_for(spec.executor.kind.unwrap_or_else(
        telemetry_gate_core::model::ExecutorKind::default_for_host,
    ));
    let mut command = Command::new(interpreter);
    command.args(&leading_args);
    command.arg(script_path);
    command.current_dir(&spec.temp_dir);

    if let Some(username) = &spec.username {
        if let Ok(identity) = resolve_unprivileged_user(Some(username)) {
            identity.apply_to(&mut command);
        }
    }

    run_with_deadline(&mut command, timeout)
}

/// Runs the `prereq` stage: each dependency's check script, and on non-zero
/// exit, its install script. The first dependency whose install also fails
/// aborts the whole lifecycle.
fn run_prereq(spec: &RunSpec, work_dir: &std::path::Path, timeout: Duration) -> Result<StageResult, RunnerError> {
    use telemetry_gate_core::model::ExecutorKind;
    let kind = spec.executor.kind.unwrap_or_else(ExecutorKind::default_for_host);
    let mut combined_stdout = String::new();
    let mut worst_exit_code = Some(0);
    let mut any_timed_out = false;
    let start_ns = crate::deadline::now_ns();

    for (idx, dependency) in spec.dependencies.iter().enumerate() {
        let check_path = materialize_script(work_dir, &format!("prereq-check-{idx}"), kind, &dependency.check_script)?;
        let check_outcome = run_stage_script(spec, &check_path, timeout).map_err(|source| RunnerError::ScriptWrite {
            path: check_path.display().to_string(),
            source,
        })?;
        combined_stdout.push_str(&check_outcome.stdout);
        if check_outcome.exit_code == Some(0) {
            continue;
        }

        let install_path =
            materialize_script(work_dir, &format!("prereq-install-{idx}"), kind, &dependency.install_script)?;
        let install_outcome =
            run_stage_script(spec, &install_path, timeout).map_err(|source| RunnerError::ScriptWrite {
                path: install_path.display().to_string(),
                source,
            })?;
        combined_stdout.push_str(&install_outcome.stdout);
        any_timed_out |= install_outcome.timed_out;
        if install_outcome.exit_code != Some(0) {
            worst_exit_code = install_outcome.exit_code.or(Some(1));
            break;
        }
    }

    Ok(StageResult {
        stage: Stage::Prereq,
        exit_code: worst_exit_code,
        stdout: combined_stdout,
        duration_ms: 0,
        start_ns,
        end_ns: crate::deadline::now_ns(),
        timed_out: any_timed_out,
        err_msg: None,
    })
}

/// Runs either the `test` or `cleanup` stage from already-interpolated
/// `command` text.
fn run_command_stage(
    spec: &RunSpec,
    work_dir: &std::path::Path,
    stage: Stage,
    command: &str,
    timeout: Duration,
) -> Result<StageResult, RunnerError> {
    let Some(kind) = spec.executor.kind else {
        return Err(RunnerError::UnknownExecutor(spec.executor.raw_name.clone()));
    };
    let script_path = materialize_script(work_dir, stage.marker_name(), kind, command)?;
    let outcome = run_stage_script(spec, &script_path, timeout).map_err(|source| RunnerError::ScriptWrite {
        path: script_path.display().to_string(),
        source,
    })?;
    let duration_ms = u64::try_from((outcome.end_ns - outcome.start_ns).max(0) / 1_000_000).unwrap_or(u64::MAX);
    Ok(StageResult {
        stage,
        exit_code: outcome.exit_code,
        stdout: outcome.stdout,
        duration_ms,
        start_ns: outcome.start_ns,
        end_ns: outcome.end_ns,
        timed_out: outcome.timed_out,
        err_msg: None,
    })
}

/// Per-stage timeouts for one lifecycle run, mirroring
/// `telemetry-gate-config::RunnerConfig`.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    /// Timeout for each dependency's check/install script.
    pub prereq: Duration,
    /// Timeout for the `test` stage. Defaults to `spec.timeout_secs` when
    /// the caller has no override.
    pub test: Duration,
    /// Timeout for the `cleanup` stage.
    pub cleanup: Duration,
}

/// Runs the full prereq/test/cleanup lifecycle for `spec`, writing scripts
/// into a fresh [`WorkDirGuard`]-scoped directory.
///
/// # Errors
///
/// Returns [`RunnerError`] when the working directory cannot be created or
/// a script cannot be written; a failing *test* (non-zero exit, timeout) is
/// not an error here, it is recorded in the returned [`RunResult`].
pub fn execute_lifecycle(
    spec: &RunSpec,
    temp_root: &std::path::Path,
    rand_suffix: u64,
    timeouts: StageTimeouts,
    test_command: &str,
    cleanup_command: Option<&str>,
    comment: Option<String>,
) -> Result<RunResult, RunnerError> {
    let mut work_dir = WorkDirGuard::create(temp_root, spec.technique_id.as_str(), spec.test_index, rand_suffix)?;

    let mut stages = Vec::new();
    let mut status_is_prereq_fail = false;

    if !spec.dependencies.is_empty() {
        let prereq_result = run_prereq(spec, work_dir.path(), timeouts.prereq)?;
        status_is_prereq_fail = prereq_result.exit_code != Some(0);
        stages.push(prereq_result);
    }

    let (mut start_ns, mut end_ns, mut is_cleaned_up) = (0, 0, false);

    if !status_is_prereq_fail {
        let test_result = run_command_stage(spec, work_dir.path(), Stage::Test, test_command, timeouts.test)?;
        start_ns = test_result.start_ns;
        end_ns = test_result.end_ns;
        stages.push(test_result);

        if let Some(cleanup_command) = cleanup_command {
            let cleanup_result =
                run_command_stage(spec, work_dir.path(), Stage::Cleanup, cleanup_command, timeouts.cleanup)?;
            is_cleaned_up = cleanup_result.exit_code == Some(0);
            stages.push(cleanup_result);
        } else {
            is_cleaned_up = true;
        }
    }

    let status = derive_status(status_is_prereq_fail, &stages);
    work_dir.close();

    Ok(RunResult {
        test_id: format!("{}_{}", spec.technique_id.as_str(), spec.test_index),
        stages,
        status,
        start_ns,
        end_ns,
        is_cleaned_up,
        comment,
    })
}

fn derive_status(prereq_failed: bool, stages: &[StageResult]) -> telemetry_gate_core::model::TestStatus {
    use telemetry_gate_core::model::TestStatus;
    if prereq_failed {
        return TestStatus::PreReqFail;
    }
    let Some(test_stage) = stages.iter().find(|s| s.stage == Stage::Test) else {
        return TestStatus::RunnerFail;
    };
    if test_stage.timed_out || test_stage.exit_code != Some(0) {
        TestStatus::TestFail
    } else {
        TestStatus::TestRan
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use telemetry_gate_core::model::Executor;
    use telemetry_gate_core::model::ExecutorKind;
    use telemetry_gate_core::model::TechniqueId;
    use telemetry_gate_core::model::TestGuid;

    use super::*;

    fn base_spec(temp_dir: &std::path::Path) -> RunSpec {
        RunSpec {
            technique_id: TechniqueId::new("T1027"),
            test_index: 1,
            test_guid: TestGuid::new("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            test_name: "Echo a value".to_string(),
            executor: Executor {
                kind: Some(ExecutorKind::Sh),
                raw_name: "sh".to_string(),
                command: "echo hi".to_string(),
                cleanup_command: None,
                elevation_required: false,
            },
            args: BTreeMap::new(),
            atomics_dir: "/opt/atomics".to_string(),
            temp_dir: temp_dir.display().to_string(),
            results_dir: "/tmp/results".to_string(),
            username: None,
            timeout_secs: 5,
            stage: Stage::Test,
            dependencies: vec![],
        }
    }

    fn short_timeouts() -> StageTimeouts {
        StageTimeouts {
            prereq: Duration::from_secs(5),
            test: Duration::from_secs(5),
            cleanup: Duration::from_secs(5),
        }
    }

    #[test]
    fn runs_a_passing_test_with_no_dependencies() {
        let temp_root = std::env::temp_dir();
        let mut spec = base_spec(&temp_root);
        spec.temp_dir = temp_root.display().to_string();
        let result = execute_lifecycle(&spec, &temp_root, 1001, short_timeouts(), "echo hi", None, None).unwrap();
        assert_eq!(result.status, telemetry_gate_core::model::TestStatus::TestRan);
        assert!(result.is_cleaned_up);
    }

    #[test]
    fn a_failing_test_command_yields_test_fail() {
        let temp_root = std::env::temp_dir();
        let spec = base_spec(&temp_root);
        let result = execute_lifecycle(&spec, &temp_root, 1002, short_timeouts(), "exit 1", None, None).unwrap();
        assert_eq!(result.status, telemetry_gate_core::model::TestStatus::TestFail);
    }
}
