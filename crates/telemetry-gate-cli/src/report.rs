// telemetry-gate-cli/src/report.rs
// ============================================================================
// Module: Reporting
// Description: Synchronous stdout/stderr writers and the batch tally line.
// Dependencies: telemetry-gate-core
// ============================================================================

//! ## Overview
//! A single choke point for user-facing output so a broken pipe never
//! panics the process. The harness runs on a single synchronous
//! orchestrator thread, so these write directly rather than through any
//! async layer.

use std::io::Write;

use telemetry_gate_core::model::RunResult;
use telemetry_gate_core::model::TestStatus;

/// Writes `line` followed by a newline to stdout, ignoring a broken pipe
/// (so piping output into `head` doesn't panic the process).
pub fn write_stdout_line(line: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{line}");
}

/// Writes `line` followed by a newline to stderr.
pub fn write_stderr_line(line: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{line}");
}

/// The seven buckets that appear in the final tally line, in report
/// order.
pub const TALLY_BUCKETS: [&str; 7] = [
    "Validated",
    "Partial",
    "NoTelemetry",
    "Skipped",
    "RunErrors",
    "MissingDeps",
    "NoTests",
];

/// Buckets a final `TestStatus` into one of the tally's named columns. Not
/// every `TestStatus` has its own column: several runner-side failures are
/// folded into `RunErrors`, and `NoAtomic`/`NoCriteria` into `NoTests`.
#[must_use]
pub fn tally_bucket(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Validated => "Validated",
        TestStatus::Partial | TestStatus::ReadyToEvaluate => "Partial",
        TestStatus::NoTelemetry => "NoTelemetry",
        TestStatus::Skipped => "Skipped",
        TestStatus::PreReqFail => "MissingDeps",
        TestStatus::NoAtomic | TestStatus::NoCriteria => "NoTests",
        TestStatus::Unknown
        | TestStatus::MiscError
        | TestStatus::InvalidArgs
        | TestStatus::RunnerFail
        | TestStatus::TestFail
        | TestStatus::TestRan
        | TestStatus::ToolFail => "RunErrors",
    }
}

/// Tallies a batch of final statuses into the named buckets from
/// [`TALLY_BUCKETS`], zero-filling buckets nothing landed in.
#[must_use]
pub fn tally_statuses(statuses: &[TestStatus]) -> std::collections::BTreeMap<&'static str, usize> {
    let mut tally: std::collections::BTreeMap<&'static str, usize> =
        TALLY_BUCKETS.iter().map(|&bucket| (bucket, 0)).collect();
    for status in statuses {
        *tally.entry(tally_bucket(*status)).or_insert(0) += 1;
    }
    tally
}

/// Renders the tally line in the documented format:
/// `Validated:N Partial:N NoTelemetry:N Skipped:N RunErrors:N MissingDeps:N NoTests:N`.
#[must_use]
pub fn render_tally_line(tally: &std::collections::BTreeMap<&'static str, usize>) -> String {
    TALLY_BUCKETS
        .iter()
        .map(|bucket| format!("{bucket}:{}", tally.get(bucket).copied().unwrap_or(0)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One row of the verbose per-test progress line printed while `--verbose`
/// is set.
#[must_use]
pub fn render_progress_line(test_id: &str, display_name: &str, status: TestStatus) -> String {
    format!("{test_id:<20} {display_name:<40} {}", status.describe())
}

/// Renders one line of `status.txt`'s per-test section.
#[must_use]
pub fn render_status_line(result: &RunResult) -> String {
    format!("{:<24} {}", result.test_id, result.status.describe())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_line_lists_all_buckets_in_order() {
        let tally = tally_statuses(&[TestStatus::Validated, TestStatus::Validated, TestStatus::Partial]);
        assert_eq!(
            render_tally_line(&tally),
            "Validated:2 Partial:1 NoTelemetry:0 Skipped:0 RunErrors:0 MissingDeps:0 NoTests:0"
        );
    }

    #[test]
    fn unmapped_statuses_fold_into_run_errors() {
        assert_eq!(tally_bucket(TestStatus::TestFail), "RunErrors");
        assert_eq!(tally_bucket(TestStatus::ToolFail), "RunErrors");
        assert_eq!(tally_bucket(TestStatus::PreReqFail), "MissingDeps");
    }
}
