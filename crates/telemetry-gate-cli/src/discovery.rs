// telemetry-gate-cli/src/discovery.rs
// ============================================================================
// Module: Catalog & Criteria Tree Discovery
// Description: Walks the on-disk atomics catalog and criteria directories,
//              loading every index/YAML/CSV file they contain into one
//              in-memory test universe.
// Dependencies: telemetry-gate-core
// ============================================================================

//! ## Overview
//! The loader in `telemetry-gate-core` knows how to parse one index file,
//! one technique YAML, or one criteria file; it has no opinion on where
//! those files live on disk. [`load_universe`] owns that layout:
//! `<atomics>/Indexes/Indexes-CSV/*.csv` for the per-platform index,
//! `<atomics>/<TechniqueId>/<TechniqueId>.{yaml,yml}` for each technique's
//! catalog entry, and `<criteria>/<platform>/*.csv` for criteria files. A
//! technique referenced by an index row but missing its YAML, or a criteria
//! file that fails to parse, is logged as a warning and skipped rather than
//! aborting the whole load.

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use telemetry_gate_core::loader::CatalogIndexRow;
use telemetry_gate_core::loader::LoaderError;
use telemetry_gate_core::loader::load_catalog_index;
use telemetry_gate_core::loader::load_criteria_file;
use telemetry_gate_core::loader::load_technique_yaml;
use telemetry_gate_core::model::ExpectedEvidence;
use telemetry_gate_core::model::TechniqueId;
use telemetry_gate_core::model::TestCase;
use thiserror::Error;

/// Errors that abort discovery outright, as opposed to a single missing or
/// malformed file, which is recorded as a warning.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The atomics directory itself is missing.
    #[error("atomics directory not found: {0}")]
    AtomicsDirMissing(String),
    /// The criteria directory itself is missing.
    #[error("criteria directory not found: {0}")]
    CriteriaDirMissing(String),
    /// A directory could not be listed.
    #[error("failed to read directory {path}: {source}")]
    Io {
        /// Path that failed to list.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The catalog index itself could not be read.
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

/// The full set of `TestCase`s and `ExpectedEvidence` blocks discovered from
/// one atomics/criteria tree, plus any non-fatal warnings collected along
/// the way.
#[derive(Debug, Clone)]
pub struct Universe {
    /// Every catalog entry, deduplicated by `(TechniqueId, TestGuid)`.
    pub catalog: Vec<TestCase>,
    /// Every criteria block loaded from every platform's criteria files.
    pub criteria: Vec<ExpectedEvidence>,
    /// Human-readable warnings: missing technique YAML, unparseable rows.
    pub warnings: Vec<String>,
}

/// Lists the immediate file entries of `dir` matching `extension`
/// (case-insensitive), sorted for deterministic load order.
fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir)
        .map_err(|source| DiscoveryError::Io { path: dir.display().to_string(), source })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io { path: dir.display().to_string(), source })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case(extension)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Lists the immediate subdirectories of `dir`, sorted for deterministic
/// load order.
fn list_subdirs(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|source| DiscoveryError::Io { path: dir.display().to_string(), source })?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io { path: dir.display().to_string(), source })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Loads every `<platform>-index.csv` under `<atomics>/Indexes/Indexes-CSV/`
/// into one combined row list.
fn load_index_rows(atomics_dir: &Path) -> Result<Vec<CatalogIndexRow>, DiscoveryError> {
    let index_dir = atomics_dir.join("Indexes").join("Indexes-CSV");
    let mut rows = Vec::new();
    for path in list_files_with_extension(&index_dir, "csv")? {
        rows.extend(load_catalog_index(&path)?);
    }
    Ok(rows)
}

/// Loads `<atomics>/<TechniqueId>/<TechniqueId>.yaml` (or `.yml`) for every
/// distinct technique named in `index_rows`, skipping (with a warning) any
/// technique whose YAML file is absent.
fn load_catalog(atomics_dir: &Path, index_rows: &[CatalogIndexRow], warnings: &mut Vec<String>) -> Vec<TestCase> {
    let technique_ids: BTreeSet<TechniqueId> = index_rows.iter().map(|row| row.technique_id.clone()).collect();
    let mut cases = Vec::new();
    for technique_id in technique_ids {
        let dir = atomics_dir.join(technique_id.as_str());
        let yaml_path = [dir.join(format!("{technique_id}.yaml")), dir.join(format!("{technique_id}.yml"))]
            .into_iter()
            .find(|p| p.is_file());
        let Some(yaml_path) = yaml_path else {
            warnings.push(format!("{technique_id}: no catalog YAML found under {}", dir.display()));
            continue;
        };
        match load_technique_yaml(&technique_id, &yaml_path) {
            Ok(mut technique_cases) => cases.append(&mut technique_cases),
            Err(err) => warnings.push(format!("{technique_id}: {err}")),
        }
    }
    telemetry_gate_core::loader::catalog::dedup_test_cases(cases)
}

/// Loads every `*.csv` file under every platform subdirectory of
/// `criteria_dir`.
fn load_criteria(criteria_dir: &Path, warnings: &mut Vec<String>) -> Result<Vec<ExpectedEvidence>, DiscoveryError> {
    let mut criteria = Vec::new();
    for platform_dir in list_subdirs(criteria_dir)? {
        for path in list_files_with_extension(&platform_dir, "csv")? {
            let (blocks, file_warnings) = load_criteria_file(&path)?;
            for warning in file_warnings {
                warnings.push(format!("{}:{}: {}", path.display(), warning.line, warning.message));
            }
            criteria.extend(blocks);
        }
    }
    Ok(criteria)
}

/// Walks `atomics_dir` and `criteria_dir` into one loaded [`Universe`].
///
/// # Errors
///
/// Returns [`DiscoveryError::AtomicsDirMissing`] or
/// [`DiscoveryError::CriteriaDirMissing`] when either root is absent, or
/// [`DiscoveryError::Io`]/[`DiscoveryError::Loader`] for a directory that
/// cannot be listed or an index file that cannot be read. A missing
/// technique YAML or a malformed criteria row is recorded in
/// [`Universe::warnings`] instead of aborting the load.
pub fn load_universe(atomics_dir: &Path, criteria_dir: &Path) -> Result<Universe, DiscoveryError> {
    if !atomics_dir.is_dir() {
        return Err(DiscoveryError::AtomicsDirMissing(atomics_dir.display().to_string()));
    }
    if !criteria_dir.is_dir() {
        return Err(DiscoveryError::CriteriaDirMissing(criteria_dir.display().to_string()));
    }

    let mut warnings = Vec::new();
    let index_rows = load_index_rows(atomics_dir)?;
    let catalog = load_catalog(atomics_dir, &index_rows, &mut warnings);
    let criteria = load_criteria(criteria_dir, &mut warnings)?;

    Ok(Universe { catalog, criteria, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn missing_atomics_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_universe(&dir.path().join("nope"), dir.path()).unwrap_err();
        assert!(matches!(err, DiscoveryError::AtomicsDirMissing(_)));
    }

    #[test]
    fn missing_criteria_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_universe(dir.path(), &dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DiscoveryError::CriteriaDirMissing(_)));
    }

    #[test]
    fn loads_a_full_tree() {
        let dir = tempfile::tempdir().unwrap();
        let atomics = dir.path().join("atomics");
        let criteria = dir.path().join("criteria");

        write(
            &atomics.join("Indexes/Indexes-CSV/linux-index.csv"),
            "Tactic,TechniqueId,TechniqueName,TestIndex,TestName,TestGuid,Executor\n\
             Defense Evasion,T1027,Obfuscated Files,1,Test,aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa,sh\n",
        );
        write(
            &atomics.join("T1027/T1027.yaml"),
            "atomic_tests:\n\
             - name: Test\n  \
               auto_generated_guid: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n  \
               supported_platforms: [linux]\n  \
               executor:\n    name: sh\n    command: echo hi\n",
        );
        write(&criteria.join("linux/t1027.csv"), "T1027,linux,1,Test\n_E_,Process,cmdline=echo hi\n");

        let universe = load_universe(&atomics, &criteria).unwrap();
        assert_eq!(universe.catalog.len(), 1);
        assert_eq!(universe.criteria.len(), 1);
        assert!(universe.warnings.is_empty());
    }

    #[test]
    fn missing_technique_yaml_is_a_warning_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let atomics = dir.path().join("atomics");
        let criteria = dir.path().join("criteria");
        std::fs::create_dir_all(&criteria).unwrap();

        write(
            &atomics.join("Indexes/Indexes-CSV/linux-index.csv"),
            "Tactic,TechniqueId,TechniqueName,TestIndex,TestName,TestGuid,Executor\n\
             Defense Evasion,T9999,Missing,1,Test,aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa,sh\n",
        );

        let universe = load_universe(&atomics, &criteria).unwrap();
        assert!(universe.catalog.is_empty());
        assert_eq!(universe.warnings.len(), 1);
    }
}
