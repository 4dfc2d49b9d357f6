// telemetry-gate-core/src/loader/catalog.rs
// ============================================================================
// Module: Catalog Loader
// Description: Parses the platform index CSV and per-technique YAML files.
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::loader::LoaderError;
use crate::model::Dependency;
use crate::model::Executor;
use crate::model::ExecutorKind;
use crate::model::InputArg;
use crate::model::Platform;
use crate::model::TechniqueId;
use crate::model::TestCase;
use crate::model::TestGuid;

/// One row of `Indexes/Indexes-CSV/<platform>-index.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIndexRow {
    /// Tactic label, informational only.
    pub tactic: String,
    /// Technique identifier.
    pub technique_id: TechniqueId,
    /// Technique display name.
    pub technique_name: String,
    /// 1-based test index.
    pub test_index: u32,
    /// Test display name.
    pub test_name: String,
    /// Test GUID.
    pub test_guid: TestGuid,
    /// Executor name as recorded in the index (may differ from the YAML's
    /// own executor name in malformed catalogs; the YAML is authoritative).
    pub executor: String,
}

impl fmt::Display for CatalogIndexRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.technique_id, self.test_index)
    }
}

/// Parses a platform index CSV into rows, skipping the header and any
/// `#`-commented first column. Malformed rows are dropped silently, mirroring
/// the loader's "log and skip" policy for malformed criteria rows.
#[must_use]
pub fn parse_catalog_index(contents: &str) -> Vec<CatalogIndexRow> {
    let mut rows = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line_no == 0 {
            continue;
        }
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.first().is_some_and(|f| f.starts_with('#')) {
            continue;
        }
        if fields.len() < 7 {
            continue;
        }
        let Ok(test_index) = fields[3].parse::<u32>() else {
            continue;
        };
        rows.push(CatalogIndexRow {
            tactic: fields[0].to_string(),
            technique_id: TechniqueId::new(fields[1]),
            technique_name: fields[2].to_string(),
            test_index,
            test_name: fields[4].to_string(),
            test_guid: TestGuid::new(fields[5]),
            executor: fields[6].to_string(),
        });
    }
    rows
}

/// Reads and parses the index CSV at `path`.
///
/// # Errors
///
/// Returns [`LoaderError::IndexRead`] when the file cannot be read.
pub fn load_catalog_index(path: &Path) -> Result<Vec<CatalogIndexRow>, LoaderError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoaderError::IndexRead {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_catalog_index(&contents))
}

#[derive(Debug, Deserialize)]
struct YamlAtomics {
    #[serde(default)]
    atomic_tests: Vec<YamlAtomicTest>,
}

#[derive(Debug, Deserialize)]
struct YamlAtomicTest {
    name: String,
    #[serde(default)]
    auto_generated_guid: Option<String>,
    #[serde(default)]
    supported_platforms: Vec<String>,
    #[serde(default)]
    input_arguments: BTreeMap<String, YamlInputArg>,
    executor: YamlExecutor,
    #[serde(default)]
    dependency_executor_name: Option<String>,
    #[serde(default)]
    dependencies: Vec<YamlDependency>,
}

#[derive(Debug, Deserialize)]
struct YamlInputArg {
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "type")]
    arg_type: String,
}

#[derive(Debug, Deserialize)]
struct YamlExecutor {
    name: String,
    #[serde(default)]
    elevation_required: bool,
    #[serde(default)]
    command: String,
    #[serde(default)]
    cleanup_command: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YamlDependency {
    #[serde(default)]
    description: String,
    #[serde(default)]
    prereq_command: String,
    #[serde(default)]
    get_prereq_command: String,
}

/// Parses one technique's catalog YAML into `TestCase`s, numbering tests
/// 1-based in document order and generating a GUID when the YAML's
/// `auto_generated_guid` is absent (treated as authored-but-unknown rather
/// than fabricated; callers should treat a missing GUID as a loader defect
/// rather than silently inventing one, so this returns an index-keyed
/// placeholder GUID only as a last resort).
#[must_use]
pub fn parse_technique_yaml(technique_id: &TechniqueId, contents: &str) -> Vec<TestCase> {
    let parsed: YamlAtomics = match serde_yaml::from_str(contents) {
        Ok(p) => p,
        Err(_) => return Vec::new(),
    };
    parsed
        .atomic_tests
        .into_iter()
        .enumerate()
        .map(|(i, test)| {
            let test_index = u32::try_from(i + 1).unwrap_or(u32::MAX);
            let auto_generated_guid = test.auto_generated_guid.is_some();
            let test_guid = test
                .auto_generated_guid
                .map_or_else(|| TestGuid::new(format!("{technique_id}-{test_index:08x}")), |g| TestGuid::new(g));
            let supported_platforms = test
                .supported_platforms
                .iter()
                .filter_map(|p| Platform::parse(p))
                .collect::<BTreeSet<_>>();
            let input_args = test
                .input_arguments
                .into_iter()
                .map(|(name, arg)| {
                    (
                        name,
                        InputArg {
                            default: arg.default,
                            description: arg.description,
                            arg_type: arg.arg_type,
                        },
                    )
                })
                .collect();
            let executor = Executor {
                kind: ExecutorKind::parse(&test.executor.name),
                raw_name: test.executor.name,
                command: test.executor.command,
                cleanup_command: test.executor.cleanup_command,
                elevation_required: test.executor.elevation_required,
            };
            let dependencies = test
                .dependencies
                .into_iter()
                .map(|d| Dependency {
                    description: d.description,
                    check_script: d.prereq_command,
                    install_script: d.get_prereq_command,
                })
                .collect();
            TestCase {
                technique_id: technique_id.clone(),
                test_index,
                test_guid,
                display_name: test.name,
                supported_platforms,
                input_args,
                executor,
                dependency_executor_name: test.dependency_executor_name,
                dependencies,
                auto_generated_guid,
            }
        })
        .collect()
}

/// Reads and parses `<atomics>/<TechniqueId>/<TechniqueId>.yaml` (or
/// `.yml`).
///
/// # Errors
///
/// Returns [`LoaderError::YamlRead`] or [`LoaderError::YamlParse`].
pub fn load_technique_yaml(technique_id: &TechniqueId, path: &Path) -> Result<Vec<TestCase>, LoaderError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoaderError::YamlRead {
        path: path.display().to_string(),
        source,
    })?;
    // Parse once here purely to surface a YamlParse error with the file    // path attached; parse_technique_yaml re-parses internally so that it
    // stays independently testable against raw strings.
    let _: YamlAtomics = serde_yaml::from_str(&contents).map_err(|source| LoaderError::YamlParse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_technique_yaml(technique_id, &contents))
}

/// Deduplicates `TestCase`s by `(technique_id, test_guid)`, keeping the
/// first occurrence.
#[must_use]
pub fn dedup_test_cases(cases: Vec<TestCase>) -> Vec<TestCase> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(cases.len());
    for case in cases {
        let key = (case.technique_id.clone(), case.test_guid.clone());
        if seen.insert(key) {
            out.push(case);
        }
    }
    out
}
