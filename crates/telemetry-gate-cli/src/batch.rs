// telemetry-gate-cli/src/batch.rs
// ============================================================================
// Module: Batch Orchestration
// Description: Loads configuration and the test universe, plans the
//              selected tests, runs each one via `goartrun`, fetches
//              telemetry once, and runs the matcher pass.
// Dependencies: telemetry-gate-core, telemetry-gate-config,
//               telemetry-gate-providers, telemetry-gate-broker
// ============================================================================

//! ## Overview
//! `run_batch` is the harness's single entry point: load the catalog and
//! criteria, join and plan the selected tests, run each one's lifecycle,
//! fetch and match telemetry, and report a final tally — all on a single
//! orchestrator thread.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use telemetry_gate_core::interfaces::HostInfoProvider;
use telemetry_gate_core::interfaces::RunRecordStore;
use telemetry_gate_core::loader::join::JoinOutcome;
use telemetry_gate_core::loader::join::join_catalog_and_criteria;
use telemetry_gate_core::matcher::AttributionGates;
use telemetry_gate_core::matcher::run_matcher_pass;
use telemetry_gate_core::model::ExpectedEvidence;
use telemetry_gate_core::model::RunResult;
use telemetry_gate_core::model::RunSpec;
use telemetry_gate_core::model::Stage;
use telemetry_gate_core::model::TechniqueId;
use telemetry_gate_core::model::TestStatus;
use telemetry_gate_core::planner::PlannedTest;
use telemetry_gate_core::planner::Selector;
use telemetry_gate_core::planner::interpolate;
use telemetry_gate_core::planner::plan_tests;
use telemetry_gate_providers::OsHostInfoProvider;
use telemetry_gate_runner::marker_dir_name;
use telemetry_gate_runner::strip_hash_comment;
use thiserror::Error;

use crate::args::Cli;
use crate::discovery;
use crate::goart::GoartConfig;
use crate::goart::default_goart_path;
use crate::goart::run_summary_path;
use crate::report::render_progress_line;
use crate::report::tally_statuses;
use crate::report::write_stderr_line;
use crate::report::write_stdout_line;
use crate::signal::KeepRunning;
use crate::state::FsRunRecordStore;

/// Errors that abort the whole batch rather than a single test.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The host's ambient facts could not be collected.
    #[error(transparent)]
    HostInfo(#[from] telemetry_gate_core::interfaces::HostInfoError),
    /// The catalog or criteria tree could not be walked.
    #[error(transparent)]
    Discovery(#[from] discovery::DiscoveryError),
    /// A selector string did not parse.
    #[error(transparent)]
    Planner(#[from] telemetry_gate_core::planner::PlannerError),
    /// The configuration file was invalid.
    #[error(transparent)]
    Config(#[from] telemetry_gate_config::ConfigError),
    /// A telemetry tool's prepare or fetch pass failed.
    #[error(transparent)]
    Broker(#[from] telemetry_gate_broker::BrokerError),
    /// The results store could not be opened or written.
    #[error(transparent)]
    Store(#[from] telemetry_gate_core::interfaces::RunRecordStoreError),
}

impl BatchError {
    /// Maps this error to the process exit code it should produce.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Planner(_) | Self::Config(_) => TestStatus::InvalidArgs as i32,
            Self::Discovery(discovery::DiscoveryError::CriteriaDirMissing(_)) => TestStatus::InvalidArgs as i32,
            _ => TestStatus::RunnerFail as i32,
        }
    }
}

/// Final summary of a completed (or signal-interrupted) batch run.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Tally of final statuses, keyed by report buckets.
    pub tally: BTreeMap<&'static str, usize>,
    /// Number of tests planned.
    pub planned_count: usize,
    /// Whether the run was cut short by a caught signal.
    pub interrupted: bool,
}

struct ResolvedPaths {
    atomics_dir: PathBuf,
    criteria_dir: PathBuf,
    results_dir: PathBuf,
    goart_path: PathBuf,
    username: Option<String>,
}

fn resolve_paths(cli: &Cli, config: &telemetry_gate_config::HarnessConfig) -> ResolvedPaths {
    let atomics_dir =
        PathBuf::from(telemetry_gate_config::override_or(cli.atomicspath.as_deref(), &config.paths.atomics));
    let criteria_dir =
        PathBuf::from(telemetry_gate_config::override_or(cli.criteriapath.as_deref(), &config.paths.criteria));
    let results_dir =
        PathBuf::from(telemetry_gate_config::override_or(cli.resultspath.as_deref(), &config.paths.results));
    let goart_path = cli.goartpath.as_ref().map(PathBuf::from).unwrap_or_else(default_goart_path);
    let username = cli.username.clone().or_else(|| Some(config.runner.default_user.clone()));

    // `--retryfailed`/`--revalidate` name the prior results directory to
    // read from; absent an explicit `--resultspath`, this run's own
    // artifacts continue to land in that same directory rather than a
    // fresh one, so `status.json`/`run_results.jsonl` stay a single
    // continuous record for the batch.
    let results_dir = if cli.resultspath.is_none() {
        cli.revalidate.as_ref().or(cli.retryfailed.as_ref()).map_or(results_dir, PathBuf::from)
    } else {
        results_dir
    };

    ResolvedPaths { atomics_dir, criteria_dir, results_dir, goart_path, username }
}

fn resolve_tool_specs(cli: &Cli, config: &telemetry_gate_config::HarnessConfig) -> Vec<(String, String)> {
    let paths: Vec<String> = if cli.telemetrytoolpath.is_empty() {
        config.telemetry.tools.clone()
    } else {
        cli.telemetrytoolpath.clone()
    };
    paths
        .into_iter()
        .map(|path| {
            let suffix = Path::new(&path)
                .file_stem()
                .map(|s| format!("_{}", s.to_string_lossy()))
                .unwrap_or_else(|| "_tool".to_string());
            (path, suffix)
        })
        .collect()
}

fn resolve_selectors(cli: &Cli) -> Result<Vec<Selector>, telemetry_gate_core::planner::PlannerError> {
    let mut texts = cli.selectors.clone();
    if let Some(runlist) = &cli.runlist {
        if let Ok(contents) = std::fs::read_to_string(runlist) {
            texts.extend(contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string));
        }
    }
    texts.iter().map(|t| Selector::parse(t)).collect()
}

/// Splits a `"<TID>_<index>"` run-result test id back into its parts.
fn parse_test_id(test_id: &str) -> Option<(String, u32)> {
    let (tid, index) = test_id.rsplit_once('_')?;
    index.parse::<u32>().ok().map(|index| (tid.to_string(), index))
}

/// True for a final status that means the test actually reached the
/// matcher pass (or could with fresh criteria) — the set `--revalidate` is
/// allowed to re-examine without re-executing anything.
fn eligible_for_revalidate(status: TestStatus) -> bool {
    !matches!(
        status,
        TestStatus::Unknown
            | TestStatus::MiscError
            | TestStatus::InvalidArgs
            | TestStatus::PreReqFail
            | TestStatus::RunnerFail
            | TestStatus::Skipped
            | TestStatus::NoAtomic
    )
}

/// Builds selectors from a prior results directory's `run_results.jsonl`,
/// one `Selector::ByIndex` per distinct `(technique_id, test_index)`. With
/// `only_failing`, tests already `Validated` are left out — `--retryfailed`'s
/// view; `--revalidate` passes `false` to re-examine the whole prior batch.
fn selectors_from_prior_results(results_dir: &Path, only_failing: bool) -> Result<Vec<Selector>, BatchError> {
    let store = FsRunRecordStore::open(results_dir)?;
    let prior = store.load_prior_results()?;
    let mut selectors = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for result in &prior {
        if only_failing && result.status == TestStatus::Validated {
            continue;
        }
        let Some((tid, index)) = parse_test_id(&result.test_id) else { continue };
        if seen.insert((tid.clone(), index)) {
            selectors.push(Selector::ByIndex(TechniqueId::new(tid), index));
        }
    }
    Ok(selectors)
}

fn now_ns() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as i64).unwrap_or(0)
}

fn rand_suffix_for(test_index: u32) -> u64 {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0);
    nanos ^ (u64::from(test_index) << 32)
}

/// One planned test's outcome, tracked across the run and matcher phases.
struct TestOutcome {
    planned: PlannedTest,
    result: RunResult,
    work_dir: String,
    dir_name: String,
}

fn build_run_spec(
    planned: &PlannedTest,
    args: std::collections::BTreeMap<String, String>,
    paths: &ResolvedPaths,
    temp_root: &Path,
    timeout_secs: u64,
) -> RunSpec {
    let test_case = &planned.joined.test_case;
    RunSpec {
        technique_id: test_case.technique_id.clone(),
        test_index: test_case.test_index,
        test_guid: test_case.test_guid.clone(),
        test_name: test_case.display_name.clone(),
        executor: test_case.executor.clone(),
        args,
        atomics_dir: paths.atomics_dir.display().to_string(),
        temp_dir: temp_root.display().to_string(),
        results_dir: paths.results_dir.join(test_dir_name(planned)).display().to_string(),
        username: paths.username.clone(),
        timeout_secs,
        stage: Stage::Test,
        dependencies: test_case.dependencies.clone(),
    }
}

fn test_dir_name(planned: &PlannedTest) -> String {
    let test_case = &planned.joined.test_case;
    format!("{}_{}_{}", test_case.technique_id.as_str(), test_case.test_index, test_case.test_guid.short())
}

/// Runs one planned test via a `goartrun` child process, returning its
/// final `RunResult` and the working directory it used (for attribution).
fn run_one_test(
    planned: &PlannedTest,
    paths: &ResolvedPaths,
    host: &telemetry_gate_core::planner::HostInfo,
    servers: &telemetry_gate_core::planner::ServerTable,
    timeout_secs: u64,
    temp_root: &Path,
    verbose: bool,
) -> RunResult {
    let test_case = &planned.joined.test_case;
    let test_id = format!("{}_{}", test_case.technique_id.as_str(), test_case.test_index);

    if let Some(evidence) = &planned.joined.evidence {
        if evidence.is_blocked() {
            return stub_result(&test_id, TestStatus::Skipped);
        }
    }

    let Some(kind) = test_case.executor.kind else {
        return stub_result(&test_id, TestStatus::InvalidArgs);
    };

    let overrides =
        planned.joined.evidence.as_ref().map(|e: &ExpectedEvidence| e.args.clone()).unwrap_or_default();
    let resolved_args = test_case.resolve_args(&overrides);

    let test_command = match interpolate(&test_case.executor.command, &resolved_args, host, servers, &paths.atomics_dir.display().to_string()) {
        Ok(c) => c,
        Err(err) => {
            write_stderr_line(&format!("{test_id}: interpolation failed: {err}"));
            return stub_result(&test_id, TestStatus::InvalidArgs);
        }
    };
    let cleanup_command = match &test_case.executor.cleanup_command {
        Some(raw) => match interpolate(raw, &resolved_args, host, servers, &paths.atomics_dir.display().to_string()) {
            Ok(c) => Some(c),
            Err(_) => None,
        },
        None => None,
    };

    let (clean_test, comment) = strip_hash_comment(&test_command, kind);
    let clean_cleanup = cleanup_command.map(|c| strip_hash_comment(&c, kind).0);

    let run_spec = build_run_spec(planned, resolved_args, paths, temp_root, timeout_secs);
    let test_results_dir = PathBuf::from(&run_spec.results_dir);
    if let Err(err) = std::fs::create_dir_all(&test_results_dir) {
        write_stderr_line(&format!("{test_id}: failed to create results dir: {err}"));
        return stub_result(&test_id, TestStatus::RunnerFail);
    }

    let rand_suffix = rand_suffix_for(test_case.test_index);
    let goart_config = GoartConfig {
        spec: run_spec,
        test_command: clean_test,
        cleanup_command: clean_cleanup,
        comment,
        rand_suffix,
    };

    let config_path = test_results_dir.join("runspec.json");
    let config_json = match serde_json::to_string_pretty(&goart_config) {
        Ok(j) => j,
        Err(err) => {
            write_stderr_line(&format!("{test_id}: failed to serialize run spec: {err}"));
            return stub_result(&test_id, TestStatus::RunnerFail);
        }
    };
    if let Err(err) = std::fs::write(&config_path, config_json) {
        write_stderr_line(&format!("{test_id}: failed to write run spec: {err}"));
        return stub_result(&test_id, TestStatus::RunnerFail);
    }

    if verbose {
        write_stdout_line(&format!("launching {test_id} {}", test_case.display_name));
    }

    let outcome = Command::new(&paths.goart_path).arg("--config").arg(&config_path).output();
    let result = match outcome {
        Ok(output) => {
            let summary_path = run_summary_path(&test_results_dir);
            match std::fs::read_to_string(&summary_path).ok().and_then(|s| serde_json::from_str::<RunResult>(&s).ok()) {
                Some(result) => result,
                None => {
                    let status = TestStatus::from_code(output.status.code().unwrap_or(-1));
                    RunResult {
                        test_id: test_id.clone(),
                        stages: vec![],
                        status,
                        start_ns: 0,
                        end_ns: 0,
                        is_cleaned_up: false,
                        comment: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
                    }
                }
            }
        }
        Err(err) => {
            write_stderr_line(&format!("{test_id}: failed to spawn goartrun: {err}"));
            stub_result(&test_id, TestStatus::RunnerFail)
        }
    };
    result
}

fn stub_result(test_id: &str, status: TestStatus) -> RunResult {
    RunResult {
        test_id: test_id.to_string(),
        stages: vec![],
        status,
        start_ns: 0,
        end_ns: 0,
        is_cleaned_up: true,
        comment: None,
    }
}

/// Runs the batch described by `cli`, from loading configuration through
/// writing the final tally.
///
/// # Errors
///
/// Returns [`BatchError`] for any failure that aborts the whole batch: bad
/// configuration, an unreadable catalog/criteria tree, a bad selector, or a
/// telemetry tool failing its prepare/fetch pass.
pub fn run_batch(cli: &Cli) -> Result<BatchSummary, BatchError> {
    let config = telemetry_gate_config::load_config(None)?;
    let paths = resolve_paths(cli, &config);
    let tool_specs = resolve_tool_specs(cli, &config);
    let clear_cache = cli.telemetryclear || config.telemetry.clear_cache;
    let gates = AttributionGates { shell_gate_enabled: cli.filtergoartsh, work_dir_gate_enabled: cli.filtergoartdir };

    let host_provider = OsHostInfoProvider::new();
    let host = host_provider.collect()?;
    let servers = host_provider.load_servers(cli.serverscsv.as_deref())?;

    let universe = discovery::load_universe(&paths.atomics_dir, &paths.criteria_dir)?;
    if cli.debug {
        for warning in &universe.warnings {
            write_stderr_line(warning);
        }
    }

    let joined_outcomes = join_catalog_and_criteria(&universe.catalog, &universe.criteria);
    let mut joined_tests = Vec::new();
    let mut orphaned_criteria = 0usize;
    for outcome in joined_outcomes {
        match outcome {
            JoinOutcome::Joined(joined) => joined_tests.push(joined),
            JoinOutcome::MissingTechnique | JoinOutcome::MissingTest => orphaned_criteria += 1,
        }
    }
    if cli.debug && orphaned_criteria > 0 {
        write_stderr_line(&format!("{orphaned_criteria} criteria block(s) referenced a technique or test not in the catalog"));
    }

    let revalidate_mode = cli.revalidate.is_some();
    let selectors = if let Some(dir) = &cli.revalidate {
        selectors_from_prior_results(Path::new(dir), false)?
    } else if let Some(dir) = &cli.retryfailed {
        selectors_from_prior_results(Path::new(dir), true)?
    } else {
        resolve_selectors(cli)?
    };
    let planned = plan_tests(&selectors, &joined_tests);

    if cli.norun {
        for p in &planned {
            write_stdout_line(&format!("{}_{} {}", p.joined.test_case.technique_id.as_str(), p.joined.test_case.test_index, p.joined.test_case.display_name));
        }
        return Ok(BatchSummary { tally: tally_statuses(&[]), planned_count: planned.len(), interrupted: false });
    }

    let broker = telemetry_gate_broker::BrokerSession::new(paths.results_dir.clone(), &tool_specs);
    if !broker.is_empty() && !revalidate_mode {
        broker.prepare_all(clear_cache)?;
    }

    let temp_root = std::env::temp_dir();
    let mut outcomes: Vec<TestOutcome> = Vec::with_capacity(planned.len());
    let mut interrupted = false;
    let mut fetch_window: Option<(i64, i64)> = None;

    if revalidate_mode {
        let prior = FsRunRecordStore::open(&paths.results_dir)?.load_prior_results()?;
        for p in &planned {
            let dir_name = test_dir_name(p);
            let config_path = paths.results_dir.join(&dir_name).join("runspec.json");
            let Some(goart_config) = std::fs::read_to_string(&config_path)
                .ok()
                .and_then(|s| serde_json::from_str::<GoartConfig>(&s).ok())
            else {
                write_stderr_line(&format!("revalidate: no runspec.json for {dir_name}, skipping"));
                continue;
            };
            let test_id = format!("{}_{}", p.joined.test_case.technique_id.as_str(), p.joined.test_case.test_index);
            let mut result = prior
                .iter()
                .rev()
                .find(|r| r.test_id == test_id)
                .cloned()
                .unwrap_or_else(|| stub_result(&test_id, TestStatus::TestRan));
            if eligible_for_revalidate(result.status) {
                result.status = TestStatus::TestRan;
            }
            let work_dir = temp_root
                .join(marker_dir_name(
                    p.joined.test_case.technique_id.as_str(),
                    p.joined.test_case.test_index,
                    goart_config.rand_suffix,
                ))
                .display()
                .to_string();
            outcomes.push(TestOutcome { planned: p.clone(), result, work_dir, dir_name });
        }
        let starts: Vec<i64> = outcomes.iter().map(|o| o.result.start_ns).filter(|&n| n > 0).collect();
        let ends: Vec<i64> = outcomes.iter().map(|o| o.result.end_ns).filter(|&n| n > 0).collect();
        if !starts.is_empty() {
            fetch_window = Some((starts.into_iter().min().unwrap_or(0), ends.into_iter().max().unwrap_or_else(now_ns)));
        }
    } else {
        let keep_running = KeepRunning::install().unwrap_or_else(|_| KeepRunning::always_running());
        let batch_start_ns = now_ns();
        for (i, p) in planned.iter().enumerate() {
            if !keep_running.should_continue() {
                interrupted = true;
                break;
            }
            let result = run_one_test(p, &paths, &host, &servers, config.runner.test_timeout_secs, &temp_root, cli.verbose);
            let rand_suffix = rand_suffix_for(p.joined.test_case.test_index);
            let work_dir = temp_root
                .join(marker_dir_name(p.joined.test_case.technique_id.as_str(), p.joined.test_case.test_index, rand_suffix))
                .display()
                .to_string();
            if cli.verbose {
                write_stdout_line(&render_progress_line(
                    &result.test_id,
                    &p.joined.test_case.display_name,
                    result.status,
                ));
            }
            outcomes.push(TestOutcome { planned: p.clone(), result, work_dir, dir_name: test_dir_name(p) });

            if i + 1 < planned.len() && keep_running.should_continue() {
                std::thread::sleep(Duration::from_secs(3));
            }
        }
        fetch_window = Some((batch_start_ns, now_ns()));
    }

    if !broker.is_empty() && !outcomes.is_empty() {
        let (start_ns, end_ns) = fetch_window.unwrap_or_else(|| (now_ns(), now_ns()));
        let fetched = broker.fetch_all(start_ns, end_ns)?;
        for outcome in &mut outcomes {
            if outcome.result.status != TestStatus::TestRan {
                continue;
            }
            let Some(evidence) = &outcome.planned.joined.evidence else {
                outcome.result.status = TestStatus::NoCriteria;
                continue;
            };
            let mut best: Option<TestStatus> = None;
            for (suffix, paired) in &fetched {
                let events: Vec<telemetry_gate_core::model::NormalizedEvent> =
                    paired.iter().map(|p| p.normalized.clone()).collect();
                let mut evidence_copy = evidence.clone();
                let pass = run_matcher_pass(
                    &mut evidence_copy,
                    &events,
                    gates,
                    outcome.planned.joined.test_case.technique_id.as_str(),
                    outcome.planned.joined.test_case.test_index,
                    &outcome.work_dir,
                );
                let Ok((state, verdict)) = pass else { continue };
                best = Some(best.map_or(verdict.status, |current| current.max(verdict.status)));
                write_match_artifacts(&paths, &outcome.dir_name, suffix, &evidence_copy, &state, paired);
            }
            if let Some(status) = best {
                outcome.result.status = status;
            }
        }
    }

    let mut store = FsRunRecordStore::open(&paths.results_dir)?;
    let mut final_statuses = Vec::with_capacity(outcomes.len());
    for outcome in &outcomes {
        store.record_result(&outcome.result)?;
        final_statuses.push(outcome.result.status);
    }
    let tally = tally_statuses(&final_statuses);
    store.write_tally(&tally)?;
    write_stdout_line(&crate::report::render_tally_line(&tally));

    Ok(BatchSummary { tally, planned_count: planned.len(), interrupted })
}

fn write_match_artifacts(
    paths: &ResolvedPaths,
    dir_name: &str,
    suffix: &str,
    evidence: &ExpectedEvidence,
    state: &telemetry_gate_core::matcher::ExtractState,
    paired: &[telemetry_gate_broker::PairedEvent],
) {
    let test_dir = paths.results_dir.join(dir_name);
    let _ = std::fs::create_dir_all(&test_dir);

    let match_string = telemetry_gate_core::matcher::coverage::render_match_string(evidence, state);
    let _ = std::fs::write(test_dir.join(format!("match_string{suffix}.txt")), match_string);

    let mut matched_native = Vec::new();
    for events in state.matches.values() {
        for matched in events {
            if let Some(pair) = paired.get(matched.event_line) {
                matched_native.push(pair.native.clone());
            }
        }
    }
    if let Ok(json) = serde_json::to_string_pretty(&matched_native) {
        let _ = std::fs::write(test_dir.join(format!("matches{suffix}.json")), json);
    }

    let summary = serde_json::json!({
        "matching_tag": state.matching_tag,
        "matched_event_ids": state.matches.keys().collect::<Vec<_>>(),
        "partial_count": state.partials.len(),
    });
    if let Ok(json) = serde_json::to_string_pretty(&summary) {
        let _ = std::fs::write(test_dir.join(format!("validate_summary{suffix}.json")), json);
    }
}
