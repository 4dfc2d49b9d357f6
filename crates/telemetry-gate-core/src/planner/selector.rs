// telemetry-gate-core/src/planner/selector.rs
// ============================================================================
// Module: Selector Parsing & Resolution
// Description: Hand-written recursive-descent parser for test selectors and
//              the resolution algorithm that expands them against the
//              criteria and catalog indexes.
// ============================================================================

use crate::loader::join::JoinedTest;
use crate::model::TechniqueId;
use crate::planner::PlannerError;

/// One parsed test selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `T<tid>` — every criteria block whose technique matches this prefix.
    Technique(TechniqueId),
    /// `T<tid>#<index>` — a specific 1-based test index.
    ByIndex(TechniqueId, u32),
    /// `T<tid>#<guid-prefix>` — a specific GUID prefix.
    ByGuid(TechniqueId, String),
    /// `T<tid>,<testname>` — a specific test name.
    ByName(TechniqueId, String),
    /// `T<tid-a>..T<tid-b>` — an inclusive range over technique ids, in
    /// catalog sort order.
    Range(TechniqueId, TechniqueId),
}

impl Selector {
    /// Parses one selector string.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::BadSelector`] when the string matches none of
    /// the accepted forms.
    pub fn parse(text: &str) -> Result<Self, PlannerError> {
        let text = text.trim();
        if let Some((a, b)) = text.split_once("..") {
            if a.starts_with('T') && b.starts_with('T') {
                return Ok(Self::Range(TechniqueId::new(a), TechniqueId::new(b)));
            }
        }
        if let Some((tid, rest)) = text.split_once('#') {
            if !tid.starts_with('T') {
                return Err(PlannerError::BadSelector(text.to_string()));
            }
            return if rest.len() >= 8 && rest.chars().all(|c| c.is_ascii_hexdigit()) {
                Ok(Self::ByGuid(TechniqueId::new(tid), rest.to_ascii_lowercase()))
            } else {
                rest.parse::<u32>()
                    .map(|index| Self::ByIndex(TechniqueId::new(tid), index))
                    .map_err(|_| PlannerError::BadSelector(text.to_string()))
            };
        }
        if let Some((tid, name)) = text.split_once(',') {
            if !tid.starts_with('T') {
                return Err(PlannerError::BadSelector(text.to_string()));
            }
            return Ok(Self::ByName(TechniqueId::new(tid), name.to_string()));
        }
        if text.starts_with('T') && !text.is_empty() {
            return Ok(Self::Technique(TechniqueId::new(text)));
        }
        Err(PlannerError::BadSelector(text.to_string()))
    }
}

/// One resolved test, ready to be turned into a `RunSpec` once host info and
/// the server table are available.
#[derive(Debug, Clone)]
pub struct PlannedTest {
    /// The joined catalog + criteria record.
    pub joined: JoinedTest,
}

fn matches_selector(joined: &JoinedTest, selector: &Selector) -> bool {
    let tid = &joined.test_case.technique_id;
    match selector {
        Selector::Technique(prefix) => tid.as_str() == prefix.as_str() || tid.root() == prefix.as_str(),
        Selector::ByIndex(prefix, index) => tid.as_str() == prefix.as_str() && joined.test_case.test_index == *index,
        Selector::ByGuid(prefix, guid_prefix) => {
            tid.as_str() == prefix.as_str() && joined.test_case.test_guid.matches_short_prefix(guid_prefix)
        }
        Selector::ByName(prefix, name) => tid.as_str() == prefix.as_str() && joined.test_case.display_name == *name,
        Selector::Range(lo, hi) => tid.as_str() >= lo.as_str() && tid.as_str() <= hi.as_str(),
    }
}

/// Resolves parsed selectors against the joined test set, in selector order,
/// expanding ranges first and deduplicating by `(technique_id, test_index)`.
/// Order is stable: the first occurrence of a test across all selectors
/// determines its position.
#[must_use]
pub fn plan_tests(selectors: &[Selector], universe: &[JoinedTest]) -> Vec<PlannedTest> {
    let mut planned = Vec::new();
    let mut seen = std::collections::BTreeSet::new();

    for selector in selectors {
        for joined in universe {
            if !matches_selector(joined, selector) {
                continue;
            }
            let key = (joined.test_case.technique_id.clone(), joined.test_case.test_index);
            if seen.insert(key) {
                planned.push(PlannedTest { joined: joined.clone() });
            }
        }
    }

    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Executor;
    use crate::model::ExecutorKind;
    use crate::model::TestCase;
    use crate::model::TestGuid;
    use std::collections::BTreeSet;

    fn joined(tid: &str, index: u32) -> JoinedTest {
        JoinedTest {
            test_case: TestCase {
                technique_id: TechniqueId::new(tid),
                test_index: index,
                test_guid: TestGuid::new(format!("{tid}{index}aaaaaaaaaaaaaaaaaaaaaaaaaaaa")),
                display_name: "x".to_string(),
                supported_platforms: BTreeSet::new(),
                input_args: vec![],
                executor: Executor {
                    kind: Some(ExecutorKind::Sh),
                    raw_name: "sh".to_string(),
                    command: "true".to_string(),
                    cleanup_command: None,
                    elevation_required: false,
                },
                dependency_executor_name: None,
                dependencies: vec![],
                auto_generated_guid: false,
            },
            evidence: None,
        }
    }

    #[test]
    fn selector_expansion_matches_spec_scenario() {
        let universe = vec![
            joined("T1027", 1),
            joined("T1027", 2),
            joined("T1027.002", 2),
            joined("T1070", 1),
            joined("T1071", 1),
            joined("T1072", 1),
            joined("T1080", 1),
        ];
        let selectors = vec![
            Selector::parse("T1027").unwrap(),
            Selector::parse("T1027.002#2").unwrap(),
            Selector::parse("T1070..T1072").unwrap(),
        ];
        let planned = plan_tests(&selectors, &universe);
        let ids: Vec<(String, u32)> = planned
            .iter()
            .map(|p| (p.joined.test_case.technique_id.as_str().to_string(), p.joined.test_case.test_index))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("T1027".to_string(), 1),
                ("T1027".to_string(), 2),
                ("T1027.002".to_string(), 2),
                ("T1070".to_string(), 1),
                ("T1071".to_string(), 1),
                ("T1072".to_string(), 1),
            ]
        );
    }

    #[test]
    fn parses_guid_and_index_forms() {
        assert_eq!(
            Selector::parse("T1027#2").unwrap(),
            Selector::ByIndex(TechniqueId::new("T1027"), 2)
        );
        assert_eq!(
            Selector::parse("T1027#deadbeef").unwrap(),
            Selector::ByGuid(TechniqueId::new("T1027"), "deadbeef".to_string())
        );
    }
}
