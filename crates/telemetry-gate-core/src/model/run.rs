// telemetry-gate-core/src/model/run.rs
// ============================================================================
// Module: Run Data Model
// Description: Per-test execution plan, stage results, and run status.
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::model::catalog::Dependency;
use crate::model::catalog::Executor;
use crate::model::identifiers::TechniqueId;
use crate::model::identifiers::TestGuid;

/// One of the three execution stages of a `RunSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Dependency check/install scripts.
    Prereq,
    /// The test body.
    Test,
    /// The cleanup command.
    Cleanup,
}

impl Stage {
    /// The stage name used in the runner marker path
    /// (`goart-T<tid>-<stage>.<ext>`).
    #[must_use]
    pub fn marker_name(self) -> &'static str {
        match self {
            Self::Prereq => "prereq",
            Self::Test => "test",
            Self::Cleanup => "cleanup",
        }
    }
}

/// A `TestCase` joined with its resolved arguments, interpreter, working and
/// results directories, and per-run timeout. Created by the planner, owned
/// by the runner for the duration of one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Owning technique.
    pub technique_id: TechniqueId,
    /// 1-based test index.
    pub test_index: u32,
    /// Test GUID.
    pub test_guid: TestGuid,
    /// Display name, for reporting.
    pub test_name: String,
    /// Resolved executor (post-interpolation command text lives in the
    /// runner, not here; this is the catalog executor metadata).
    pub executor: Executor,
    /// Final resolved argument map fed to interpolation.
    pub args: BTreeMap<String, String>,
    /// Absolute path to the atomics catalog root.
    pub atomics_dir: String,
    /// Per-test scoped working directory.
    pub temp_dir: String,
    /// Per-test results directory.
    pub results_dir: String,
    /// Unprivileged user the runner should drop to, if any.
    pub username: Option<String>,
    /// Per-stage timeout, seconds.
    pub timeout_secs: u64,
    /// Which stage a standalone `goartrun` invocation should execute, per
    /// the `RunSpec` JSON config. Unused when the runner is called
    /// in-process for the whole lifecycle.
    pub stage: Stage,
    /// Ordered prerequisites, resolved from the catalog, for the `prereq`
    /// stage.
    pub dependencies: Vec<Dependency>,
}

/// Outcome of executing one `Stage` of a `RunSpec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Which stage this result is for.
    pub stage: Stage,
    /// Process exit code, or `None` if the process never started.
    pub exit_code: Option<i32>,
    /// Combined stdout+stderr, captured in full.
    pub stdout: String,
    /// Wall-clock duration of the stage.
    pub duration_ms: u64,
    /// Nanosecond timestamp at spawn.
    pub start_ns: i64,
    /// Nanosecond timestamp at exit (or deadline).
    pub end_ns: i64,
    /// Whether the stage was killed for exceeding its deadline.
    pub timed_out: bool,
    /// Error message, if the stage failed to even start.
    pub err_msg: Option<String>,
}

/// Total-ordered run outcome, with a monotonicity invariant: later variants
/// represent strictly more-validated verdicts. Discriminants are stable and
/// meaningful: `TestStatus::MiscError as i32` etc. are used as process exit
/// codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum TestStatus {
    /// No verdict yet.
    Unknown = 0,
    /// Unclassified failure.
    MiscError = 1,
    /// Selector referred to a technique absent from the catalog.
    NoAtomic = 2,
    /// Test has no matching criteria file.
    NoCriteria = 3,
    /// Skipped by a `!!!` guard or unresolved interpolation.
    Skipped = 4,
    /// Unknown executor, missing required argument, unsupported platform.
    InvalidArgs = 5,
    /// I/O error preparing the run (temp dir, script write).
    RunnerFail = 6,
    /// Prerequisite install script failed.
    PreReqFail = 7,
    /// Test script exited non-zero or timed out.
    TestFail = 8,
    /// Test ran to completion; awaiting a matcher verdict.
    TestRan = 9,
    /// Telemetry tool exited within its fail band.
    ToolFail = 10,
    /// Matcher saw zero matched coverage.
    NoTelemetry = 11,
    /// Matcher saw partial coverage.
    Partial = 12,
    /// Matcher saw full coverage.
    Validated = 13,
    /// Verdict deferred to a later revalidation pass.
    ReadyToEvaluate = 14,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl TestStatus {
    /// Short name used alongside the numeric code in user-visible messages,
    /// e.g. `"8 TestFail"`.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::MiscError => "MiscError",
            Self::NoAtomic => "NoAtomic",
            Self::NoCriteria => "NoCriteria",
            Self::Skipped => "Skipped",
            Self::InvalidArgs => "InvalidArgs",
            Self::RunnerFail => "RunnerFail",
            Self::PreReqFail => "PreReqFail",
            Self::TestFail => "TestFail",
            Self::TestRan => "TestRan",
            Self::ToolFail => "ToolFail",
            Self::NoTelemetry => "NoTelemetry",
            Self::Partial => "Partial",
            Self::Validated => "Validated",
            Self::ReadyToEvaluate => "ReadyToEvaluate",
        }
    }

    /// Formats as `"<code> <name>"`, the format used throughout user-facing
    /// reporting.
    #[must_use]
    pub fn describe(self) -> String {
        format!("{} {}", self as i32, self.short_name())
    }

    /// Maps a raw process exit code back to its `TestStatus`, used to
    /// interpret a telemetry tool's exit status. Codes outside the known
    /// range map to [`Self::MiscError`].
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::MiscError,
            2 => Self::NoAtomic,
            3 => Self::NoCriteria,
            4 => Self::Skipped,
            5 => Self::InvalidArgs,
            6 => Self::RunnerFail,
            7 => Self::PreReqFail,
            8 => Self::TestFail,
            9 => Self::TestRan,
            10 => Self::ToolFail,
            11 => Self::NoTelemetry,
            12 => Self::Partial,
            13 => Self::Validated,
            14 => Self::ReadyToEvaluate,
            _ => Self::MiscError,
        }
    }

    /// Whether this status falls in the tool-meaningful verdict band
    /// `[ToolFail, Validated]`.
    #[must_use]
    pub fn is_tool_verdict_band(self) -> bool {
        matches!(self, Self::ToolFail | Self::NoTelemetry | Self::Partial | Self::Validated)
    }
}

/// Lifecycle state of a single test run, independent of its eventual
/// `TestStatus` verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestState {
    /// Selected but not yet loaded against criteria.
    Pending,
    /// Criteria joined to the catalog entry.
    Loaded,
    /// Runner subprocess has been spawned.
    RunnerLaunched,
    /// Runner subprocess has exited.
    RunnerFinished,
    /// Waiting on the telemetry broker's fetch pass.
    WaitForTelemetry,
    /// Matcher pass complete.
    Done,
    /// Will not run this batch.
    Skip,
}

impl TestState {
    /// Fixed 4-character code used to align status-table columns.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Pending => "Pend",
            Self::Loaded => "Load",
            Self::RunnerLaunched => "Rung",
            Self::RunnerFinished => "Exit",
            Self::WaitForTelemetry => "WaiT",
            Self::Done => "Done",
            Self::Skip => "Skip",
        }
    }
}

/// Final per-test record written to `run_summary.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// `<TechniqueId>_<TestIndex>` style identifier.
    pub test_id: String,
    /// Results of each stage actually attempted.
    pub stages: Vec<StageResult>,
    /// Final verdict.
    pub status: TestStatus,
    /// Nanosecond timestamp of the test stage's spawn.
    pub start_ns: i64,
    /// Nanosecond timestamp of the test stage's exit.
    pub end_ns: i64,
    /// Whether cleanup completed (best-effort; failures are warnings only).
    pub is_cleaned_up: bool,
    /// Trailing comment stripped from the interpolated command by the
    /// hash-comment rule, retained here so `run_summary.json` need not
    /// re-parse the command to recover it.
    pub comment: Option<String>,
}

/// Per-`RunSpec` attribution-window state. All fields default to 0, meaning
/// "unset"; `time_of_parent_shell <= time_of_next_stage` once both are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributionWindow {
    /// Nanosecond timestamp the test-stage marker shell was recognised.
    pub time_of_parent_shell: i64,
    /// Nanosecond timestamp the next stage's marker was recognised.
    pub time_of_next_stage: i64,
    /// Process id of the recognised parent shell.
    pub shell_pid: i64,
    /// Nanosecond timestamp the working directory was created.
    pub time_work_dir_create: i64,
    /// Nanosecond timestamp the working directory was deleted.
    pub time_work_dir_delete: i64,
}

impl AttributionWindow {
    /// Whether the shell-process gate is currently open: a parent shell has
    /// been seen and no later stage marker has appeared yet.
    #[must_use]
    pub fn shell_gate_open(&self) -> bool {
        self.time_of_parent_shell != 0 && self.time_of_next_stage == 0
    }

    /// Whether the working-directory gate is currently open.
    #[must_use]
    pub fn work_dir_gate_open(&self) -> bool {
        self.time_work_dir_create != 0 && self.time_work_dir_delete == 0
    }

    /// True when `ts` falls within the open shell-process window.
    #[must_use]
    pub fn contains_shell(&self, ts: i64) -> bool {
        self.shell_gate_open() && ts >= self.time_of_parent_shell
    }
}
