// telemetry-gate-cli/src/args.rs
// ============================================================================
// Module: Harness CLI Surface
// Description: clap argument definitions for the `harness` binary.
// Dependencies: clap
// ============================================================================

//! ## Overview
//! Every flag is optional, defaulting to either a `telemetry-gate.toml`
//! value or the harness's own built-in default, per
//! [`telemetry_gate_config::override_or`].

use clap::Parser;

/// Batch test-orchestration harness: loads the atomic catalog and expected
/// evidence criteria, runs the selected tests, fetches telemetry, and
/// matches it against the criteria.
#[derive(Debug, Parser)]
#[command(name = "harness", version)]
pub struct Cli {
    /// Root of the expected-evidence criteria tree.
    #[arg(long)]
    pub criteriapath: Option<String>,

    /// Root of the atomics catalog.
    #[arg(long)]
    pub atomicspath: Option<String>,

    /// Root results directory for this invocation.
    #[arg(long)]
    pub resultspath: Option<String>,

    /// Path to the `goartrun` binary used to execute each test. Defaults to
    /// a `goartrun` binary alongside this one.
    #[arg(long)]
    pub goartpath: Option<String>,

    /// Comma-delimited list of telemetry tool binary paths.
    #[arg(long, value_delimiter = ',')]
    pub telemetrytoolpath: Vec<String>,

    /// File listing selectors, one per line, as an alternative to trailing
    /// positional selectors.
    #[arg(long)]
    pub runlist: Option<String>,

    /// Path to `servers.csv`, populating `$SERVER[...]` interpolation.
    #[arg(long)]
    pub serverscsv: Option<String>,

    /// Unprivileged user to drop to when running as root.
    #[arg(long)]
    pub username: Option<String>,

    /// Re-run only the non-passing tests recorded in a prior results
    /// directory, in place of resolving `SELECTOR` arguments.
    #[arg(long)]
    pub retryfailed: Option<String>,

    /// Re-run the matcher pass only, against a prior results directory's
    /// already-fetched telemetry, without re-executing any test.
    #[arg(long)]
    pub revalidate: Option<String>,

    /// Pass `--clearcache` on each telemetry tool's prepare pass.
    #[arg(long)]
    pub telemetryclear: bool,

    /// Enable or disable the attribution window's shell-process gate.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub filtergoartsh: bool,

    /// Enable or disable the attribution window's working-directory gate.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub filtergoartdir: bool,

    /// Resolve and report the planned test set without executing anything.
    #[arg(long)]
    pub norun: bool,

    /// Print one line of progress per test as the batch runs.
    #[arg(long)]
    pub verbose: bool,

    /// Print additional diagnostic detail (loader warnings, interpolation
    /// traces) alongside `--verbose` output.
    #[arg(long)]
    pub debug: bool,

    /// Test selectors, parsed against the selector grammar.
    pub selectors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selectors_and_tool_list() {
        let cli = Cli::parse_from([
            "harness",
            "--telemetrytoolpath",
            "/opt/edr1,/opt/edr2",
            "T1027",
            "T1070..T1072",
        ]);
        assert_eq!(cli.telemetrytoolpath, vec!["/opt/edr1", "/opt/edr2"]);
        assert_eq!(cli.selectors, vec!["T1027", "T1070..T1072"]);
        assert!(cli.filtergoartsh);
        assert!(cli.filtergoartdir);
    }

    #[test]
    fn boolean_valued_flags_accept_explicit_false() {
        let cli = Cli::parse_from(["harness", "--filtergoartsh=false"]);
        assert!(!cli.filtergoartsh);
        assert!(cli.filtergoartdir);
    }
}
