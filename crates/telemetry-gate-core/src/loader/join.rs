// telemetry-gate-core/src/loader/join.rs
// ============================================================================
// Module: Catalog/Criteria Join
// Description: Resolves ExpectedEvidence blocks against TestCases by
//              (TechniqueId, TestIndex) or GUID-prefix match, then backfills
//              default arguments from the catalog.
// ============================================================================

use crate::model::ExpectedEvidence;
use crate::model::TestCase;
use crate::model::TestIndexOrGuid;

/// Result of attempting to join one `ExpectedEvidence` block to the catalog.
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// Joined to exactly one `TestCase`.
    Joined(JoinedTest),
    /// No catalog entry for this blocktechnique at all.
    MissingTechnique,
    /// The technique is present but no test matched by index/GUID.
    MissingTest,
}

/// A fully resolved test: catalog metadata plus its expected evidence and
/// final argument map.
#[derive(Debug, Clone)]
pub struct JoinedTest {
    /// The catalog entry.
    pub test_case: TestCase,
    /// The joined criteria, if any were found for this test (a test may be
    /// runnable with no criteria, yielding status `NoCriteria`).
    pub evidence: Option<ExpectedEvidence>,
}

fn find_test_case<'a>(cases: &'a [TestCase], evidence: &ExpectedEvidence) -> Option<&'a TestCase> {
    match &evidence.test_ref {
        TestIndexOrGuid::Index(index) => cases.iter().find(|c| c.test_index == *index),
        TestIndexOrGuid::Guid(guid) => cases.iter().find(|c| c.test_guid.matches_short_prefix(guid.as_str())),
    }
}

/// Joins every loaded `ExpectedEvidence` block against the full catalog,
/// producing one `JoinedTest` per block that successfully resolved plus the
/// catalog entries that carried no criteria at all (so techniques lacking
/// criteria still run).
#[must_use]
pub fn join_catalog_and_criteria(catalog: &[TestCase], criteria: &[ExpectedEvidence]) -> Vec<JoinOutcome> {
    let mut outcomes = Vec::new();
    let mut joined_cases = std::collections::BTreeSet::new();

    for evidence in criteria {
        let cases_for_technique: Vec<&TestCase> =
            catalog.iter().filter(|c| c.technique_id == evidence.technique_id).collect();
        if cases_for_technique.is_empty() {
            outcomes.push(JoinOutcome::MissingTechnique);
            continue;
        }
        let owned: Vec<TestCase> = cases_for_technique.into_iter().cloned().collect();
        match find_test_case(&owned, evidence) {
            Some(case) => {
                joined_cases.insert((case.technique_id.clone(), case.test_index));
                let mut evidence = evidence.clone();
                backfill_default_args(case, &mut evidence);
                outcomes.push(JoinOutcome::Joined(JoinedTest {
                    test_case: case.clone(),
                    evidence: Some(evidence),
                }));
            }
            None => outcomes.push(JoinOutcome::MissingTest),
        }
    }

    for case in catalog {
        if joined_cases.contains(&(case.technique_id.clone(), case.test_index)) {
            continue;
        }
        outcomes.push(JoinOutcome::Joined(JoinedTest {
            test_case: case.clone(),
            evidence: None,
        }));
    }

    outcomes
}

/// Populates any `evidence.args` key not already set by an `ARG` row with
/// the catalogdeclared default for that argument.
fn backfill_default_args(case: &TestCase, evidence: &mut ExpectedEvidence) {
    for (name, arg) in &case.input_args {
        if evidence.args.contains_key(name) {
            continue;
        }
        if let Some(default) = &arg.default {
            evidence.args.insert(name.clone(), default.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    use crate::model::Executor;
    use crate::model::ExecutorKind;
    use crate::model::TechniqueId;
    use crate::model::TestGuid;

    fn sample_case(index: u32) -> TestCase {
        TestCase {
            technique_id: TechniqueId::new("T1027"),
            test_index: index,
            test_guid: TestGuid::new(format!("{index:08x}aaaaaaaaaaaaaaaaaaaaaaaa")),
            display_name: "sample".to_string(),
            supported_platforms: BTreeSet::new(),
            input_args: vec![],
            executor: Executor {
                kind: Some(ExecutorKind::Sh),
                raw_name: "sh".to_string(),
                command: "echo hi".to_string(),
                cleanup_command: None,
                elevation_required: false,
            },
            dependency_executor_name: None,
            dependencies: vec![],
            auto_generated_guid: false,
        }
    }

    fn sample_evidence(index: u32) -> ExpectedEvidence {
        ExpectedEvidence {
            technique_id: TechniqueId::new("T1027"),
            test_ref: TestIndexOrGuid::Index(index),
            display_name: "sample".to_string(),
            platform: None,
            args: BTreeMap::new(),
            events: vec![],
            correlations: vec![],
            infos: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn joins_by_index() {
        let catalog = vec![sample_case(1), sample_case(2)];
        let criteria = vec![sample_evidence(2)];
        let outcomes = join_catalog_and_criteria(&catalog, &criteria);
        let joined_with_evidence = outcomes
            .iter()
            .filter(|o| matches!(o, JoinOutcome::Joined(j) if j.evidence.is_some()))
            .count();
        assert_eq!(joined_with_evidence, 1);
    }

    #[test]
    fn missing_technique_is_reported() {
        let catalog = vec![sample_case(1)];
        let mut evidence = sample_evidence(1);
        evidence.technique_id = TechniqueId::new("T9999");
        let outcomes = join_catalog_and_criteria(&catalog, &[evidence]);
        assert!(matches!(outcomes[0], JoinOutcome::MissingTechnique));
    }
}
