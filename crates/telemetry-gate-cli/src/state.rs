// telemetry-gate-cli/src/state.rs
// ============================================================================
// Module: Filesystem Run Record Store
// Description: Implements telemetry_gate_core::RunRecordStore against the
//              persisted-state layout
// Dependencies: telemetry-gate-core, serde_json
// ============================================================================

//! ## Overview
//! [`FsRunRecordStore`] is the harness's concrete backend for the
//! `RunRecordStore` seam `telemetry-gate-core` defines, keeping the core
//! crate free of any disk-layout assumptions. Every result is appended to
//! `run_results.jsonl` as it completes
//! (crash-resilient: a killed batch leaves every test up to that point on
//! disk) and the final tally pass rewrites `status.json`/`status.txt` as a
//! complete snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use telemetry_gate_core::interfaces::RunRecordStore;
use telemetry_gate_core::interfaces::RunRecordStoreError;
use telemetry_gate_core::model::RunResult;

use crate::report::render_status_line;
use crate::report::render_tally_line;

/// Filesystem-backed [`RunRecordStore`] rooted at one batch's results
/// directory.
#[derive(Debug)]
pub struct FsRunRecordStore {
    results_root: PathBuf,
    results: Vec<RunResult>,
}

impl FsRunRecordStore {
    /// Opens a store rooted at `results_root`, creating the directory if it
    /// does not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`RunRecordStoreError::Backend`] if `results_root` cannot be
    /// created.
    pub fn open(results_root: impl Into<PathBuf>) -> Result<Self, RunRecordStoreError> {
        let results_root = results_root.into();
        fs::create_dir_all(&results_root)
            .map_err(|source| RunRecordStoreError::Backend(format!("{}: {source}", results_root.display())))?;
        Ok(Self { results_root, results: Vec::new() })
    }

    fn results_log_path(&self) -> PathBuf {
        self.results_root.join("run_results.jsonl")
    }

    /// All results recorded so far this session, in call order.
    #[must_use]
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }
}

impl RunRecordStore for FsRunRecordStore {
    fn record_result(&mut self, result: &RunResult) -> Result<(), RunRecordStoreError> {
        let line = serde_json::to_string(result)
            .map_err(|source| RunRecordStoreError::Backend(format!("serializing run result: {source}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.results_log_path())
            .map_err(|source| RunRecordStoreError::Backend(format!("opening run_results.jsonl: {source}")))?;
        writeln!(file, "{line}").map_err(|source| RunRecordStoreError::Backend(format!("writing run_results.jsonl: {source}")))?;
        self.results.push(result.clone());
        Ok(())
    }

    fn load_prior_results(&self) -> Result<Vec<RunResult>, RunRecordStoreError> {
        load_results_log(&self.results_log_path())
    }

    fn write_tally(&mut self, tally: &BTreeMap<&'static str, usize>) -> Result<(), RunRecordStoreError> {
        let status_json = serde_json::to_string_pretty(&self.results)
            .map_err(|source| RunRecordStoreError::Backend(format!("serializing status.json: {source}")))?;
        fs::write(self.results_root.join("status.json"), status_json)
            .map_err(|source| RunRecordStoreError::Backend(format!("writing status.json: {source}")))?;

        let mut status_txt = String::new();
        for result in &self.results {
            status_txt.push_str(&render_status_line(result));
            status_txt.push('\n');
        }
        status_txt.push_str(&render_tally_line(tally));
        status_txt.push('\n');
        fs::write(self.results_root.join("status.txt"), status_txt)
            .map_err(|source| RunRecordStoreError::Backend(format!("writing status.txt: {source}")))?;
        Ok(())
    }
}

/// Reads back a `run_results.jsonl` file, tolerating a missing file as an
/// empty prior-results set (the first run in a fresh results directory).
fn load_results_log(path: &Path) -> Result<Vec<RunResult>, RunRecordStoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents =
        fs::read_to_string(path).map_err(|source| RunRecordStoreError::Backend(format!("{}: {source}", path.display())))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|source| RunRecordStoreError::Backend(format!("malformed run result: {source}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_gate_core::model::TestStatus;

    fn sample_result(test_id: &str, status: TestStatus) -> RunResult {
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

    #[test]
    fn records_round_trip_through_the_jsonl_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsRunRecordStore::open(dir.path()).unwrap();
        store.record_result(&sample_result("T1027_1", TestStatus::Validated)).unwrap();
        store.record_result(&sample_result("T1027_2", TestStatus::TestFail)).unwrap();

        let reopened = FsRunRecordStore::open(dir.path()).unwrap();
        let prior = reopened.load_prior_results().unwrap();
        assert_eq!(prior.len(), 2);
        assert_eq!(prior[0].test_id, "T1027_1");
    }

    #[test]
    fn write_tally_emits_status_json_and_txt() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsRunRecordStore::open(dir.path()).unwrap();
        store.record_result(&sample_result("T1027_1", TestStatus::Validated)).unwrap();
        let tally = crate::report::tally_statuses(&[TestStatus::Validated]);
        store.write_tally(&tally).unwrap();

        assert!(dir.path().join("status.json").exists());
        let status_txt = fs::read_to_string(dir.path().join("status.txt")).unwrap();
        assert!(status_txt.contains("Validated:1"));
    }
}
