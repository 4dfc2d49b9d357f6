#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// telemetry-gate-cli/src/main.rs
// ============================================================================
// Binary: harness
// Description: Batch test-orchestration entry point.
// Dependencies: clap, telemetry-gate-cli
// ============================================================================

//! ## Overview
//! `harness` parses command-line surface, then hands off to
//! [`telemetry_gate_cli::batch::run_batch`] for the whole load/plan/run/match
//! sequence. Exit codes follow one convention: a batch that completes at all
//! (even with some tests in `RunErrors`) exits `0`; only a failure that
//! aborted the batch before a tally could be written carries a non-zero
//! `TestStatus` code.

use std::process::ExitCode;

use clap::Parser;
use telemetry_gate_cli::args::Cli;
use telemetry_gate_cli::batch::run_batch;
use telemetry_gate_cli::report::write_stderr_line;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run_batch(&cli) {
        Ok(summary) => {
            if summary.interrupted {
                write_stderr_line("harness: stopped early on signal");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            write_stderr_line(&format!("harness: {err}"));
            let code = u8::try_from(err.exit_code()).unwrap_or(u8::MAX);
            ExitCode::from(code)
        }
    }
}
