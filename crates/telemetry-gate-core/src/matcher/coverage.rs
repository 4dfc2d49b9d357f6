// telemetry-gate-core/src/matcher/coverage.rs
// ============================================================================
// Module: Coverage & Matcher Pass
// Description: Per-(TestRun x tool) state tracking, the per-event check
//              dispatch, correlation evaluation, and the coverage verdict.
// ============================================================================

//! `ExtractState` is one small struct holding per-pass mutable state,
//! built fresh for every matcher pass and discarded once the verdict and
//! diagnostics are written out.

use regex::Regex;

use crate::matcher::attribution::AttributionGates;
use crate::matcher::attribution::observe_event;
use crate::matcher::comparator::evaluate_file_predicate;
use crate::matcher::comparator::evaluate_predicate;
use crate::matcher::MatcherError;
use crate::model::AttributionWindow;
use crate::model::CorrelationKind;
use crate::model::EventKind;
use crate::model::EventPayload;
use crate::model::ExpectedEvidence;
use crate::model::FileAction;
use crate::model::NormalizedEvent;
use crate::model::TestStatus;

/// One matched concrete event retained against an `ExpectedEvent`, kept so
/// correlations can be evaluated afterward and so `matches<suffix>.json`
/// can be written.
#[derive(Debug, Clone)]
pub struct MatchedEvent {
    /// Index into the original normalized-event stream.
    pub event_line: usize,
    /// The matched event, for diagnostic output.
    pub event: NormalizedEvent,
}

/// A partial-match diagnostic: an event matched some but not all of an
/// expected event's predicates.
#[derive(Debug, Clone)]
pub struct PartialMatch {
    /// Identifier of the `ExpectedEvent` this diagnostic concerns.
    pub expected_event_id: String,
    /// Number of predicates satisfied.
    pub satisfied: usize,
    /// Total predicates on the expected event.
    pub total: usize,
    /// Index of the event that produced the partial match.
    pub event_line: usize,
}

/// Per-pass state: which expected events have matched, the attribution
/// window, and diagnostics collected along the way.
#[derive(Debug, Clone, Default)]
pub struct ExtractState {
    /// Attribution window for this `TestRun`.
    pub window: AttributionWindow,
    /// Matches accumulated per expected-event id.
    pub matches: std::collections::BTreeMap<String, Vec<MatchedEvent>>,
    /// Partial-match diagnostics.
    pub partials: Vec<PartialMatch>,
    /// First MITRE-technique tag seen on a matched event whose prefix equals
    /// this test's technique.
    pub matching_tag: Option<String>,
}

fn map_file_subkind_to_actions(sub_kind: &str) -> Vec<FileAction> {
    match sub_kind.to_ascii_uppercase().as_str() {
        "WRITE" => vec![FileAction::OpenWrite, FileAction::Rename, FileAction::Create],
        "CREATE" | "CREAT" => vec![FileAction::OpenWrite, FileAction::Create],
        "CHMOD" => vec![FileAction::Chmod],
        "CHOWN" => vec![FileAction::Chown],
        "CHATTR" => vec![FileAction::Chattr],
        "RENAME" => vec![FileAction::Rename],
        "DELETE" | "UNLINK" => vec![FileAction::Delete],
        "READ" => vec![FileAction::OpenRead],
        _ => vec![],
    }
}

/// Checks one normalized event against one expected event, returning the
/// number of satisfied predicates and the total, or `None` when the event's
/// kind/sub-kind does not apply at all.
fn check_event_against_expected(
    event: &NormalizedEvent,
    expected: &crate::model::ExpectedEvent,
) -> Result<Option<(usize, usize)>, MatcherError> {
    let kind_matches = match (expected.kind, &event.payload) {
        (EventKind::Process, EventPayload::Process(_)) => true,
        (EventKind::File, EventPayload::File(_) | EventPayload::FileRead(_)) => true,
        (EventKind::Netflow, EventPayload::Netflow(_)) => true,
        (kind, EventPayload::Other(fields)) => EventKind::from_other_tag(&fields.evt_type) == Some(kind),
        _ => false,
    };
    if !kind_matches {
        return Ok(None);
    }

    if expected.kind == EventKind::File {
        if let Some(sub_kind) = &expected.sub_kind {
            let allowed = map_file_subkind_to_actions(sub_kind);
            let actual_action = match &event.payload {
                EventPayload::File(f) | EventPayload::FileRead(f) => f.action,
                _ => return Ok(None),
            };
            if !allowed.contains(&actual_action) {
                return Ok(None);
            }
        }
        let total = expected.field_predicates.len().max(1);
        let mut satisfied = 0;
        for predicate in &expected.field_predicates {
            if evaluate_file_predicate(&event.payload, predicate)
                .map_err(|e| MatcherError::BadPredicateRegex(predicate.value.clone(), e))?
            {
                satisfied += 1;
            }
        }
        return Ok(Some((satisfied, total)));
    }

    if expected.kind == EventKind::Netflow {
        let Some(sub_kind) = &expected.sub_kind else {
            return Ok(Some((0, 1)));
        };
        let pattern = sub_kind.replace('*', ".*").to_ascii_lowercase();
        let regex = Regex::new(&pattern).map_err(|e| MatcherError::BadNetflowPattern(sub_kind.clone(), e))?;
        let EventPayload::Netflow(n) = &event.payload else {
            return Ok(None);
        };
        let flow_matches = n.flow_str.as_deref().is_some_and(|s| regex.is_match(&s.to_ascii_lowercase()))
            || n.flow_dns.as_deref().is_some_and(|s| regex.is_match(&s.to_ascii_lowercase()));
        return Ok(Some((usize::from(flow_matches), 1)));
    }

    // Process, and any other kind: flat conjunction of field predicates.
    let total = expected.field_predicates.len().max(1);
    let mut satisfied = 0;
    for predicate in &expected.field_predicates {
        if evaluate_predicate(&event.payload, expected.kind, predicate)
            .map_err(|e| MatcherError::BadPredicateRegex(predicate.value.clone(), e))?
        {
            satisfied += 1;
        }
    }
    Ok(Some((satisfied, total)))
}

/// Evaluates `evidence.correlations` against the matches already recorded in
/// `state`, setting `is_met` on each.
fn evaluate_correlations(evidence: &mut ExpectedEvidence, state: &ExtractState) {
    for correlation in &mut evidence.correlations {
        if correlation.event_indexes.len() < 2 {
            continue;
        }
        let first_id = &correlation.event_indexes[0];
        let second_id = &correlation.event_indexes[1];
        let (Some(first_matches), Some(second_matches)) =
            (state.matches.get(first_id), state.matches.get(second_id))
        else {
            continue;
        };
        let is_met = first_matches.iter().any(|a| {
            second_matches.iter().any(|b| match correlation.sub_kind {
                CorrelationKind::Pipe => chain_ids_match(&a.event, &b.event),
                CorrelationKind::ParentChild => is_parent_child(&a.event, &b.event),
            })
        });
        correlation.is_met = is_met;
    }
}

fn chain_ids_match(a: &NormalizedEvent, b: &NormalizedEvent) -> bool {
    let EventPayload::Process(pa) = &a.payload else { return false };
    let EventPayload::Process(pb) = &b.payload else { return false };
    pa.chain_id.is_some() && pa.chain_id == pb.chain_id
}

fn is_parent_child(parent: &NormalizedEvent, child: &NormalizedEvent) -> bool {
    let EventPayload::Process(parent_p) = &parent.payload else { return false };
    let EventPayload::Process(child_p) = &child.payload else { return false };
    child_p.parent_unique_pid.is_some() && child_p.parent_unique_pid == parent_p.unique_pid
}

/// Final verdict of one matcher pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchVerdict {
    /// Fraction of required coverage observed, in `[0, 1]`.
    pub coverage: f64,
    /// Resulting status: `Validated`, `Partial`, or `NoTelemetry`.
    pub status: TestStatus,
}

impl MatchVerdict {
    fn from_coverage(coverage: f64) -> Self {
        let status = if coverage >= 1.0 {
            TestStatus::Validated
        } else if coverage <= 0.0 {
            TestStatus::NoTelemetry
        } else {
            TestStatus::Partial
        };
        Self { coverage, status }
    }
}

/// Runs one full matcher pass over `events` against `evidence`, applying the
/// attribution gates, then evaluating correlations and computing coverage.
///
/// # Errors
///
/// Returns [`MatcherError`] if a regex predicate or netflow pattern fails to
/// compile.
pub fn run_matcher_pass(
    evidence: &mut ExpectedEvidence,
    events: &[NormalizedEvent],
    gates: AttributionGates,
    technique_id: &str,
    test_index: u32,
    work_dir: &str,
) -> Result<(ExtractState, MatchVerdict), MatcherError> {
    let mut state = ExtractState::default();

    for (line, event) in events.iter().enumerate() {
        let is_marker = observe_event(&mut state.window, event, technique_id, test_index, work_dir);
        if is_marker || !gates.is_eligible(&state.window, event) {
            continue;
        }

        if state.matching_tag.is_none() {
            state.matching_tag = event
                .mitre_techniques
                .iter()
                .find(|tag| tag.starts_with(technique_id))
                .cloned();
        }

        for expected in &evidence.events {
            if let Some((satisfied, total)) = check_event_against_expected(event, expected)? {
                if satisfied == total {
                    state
                        .matches
                        .entry(expected.id.clone())
                        .or_default()
                        .push(MatchedEvent { event_line: line, event: event.clone() });
                } else if satisfied > 0 {
                    state.partials.push(PartialMatch {
                        expected_event_id: expected.id.clone(),
                        satisfied,
                        total,
                        event_line: line,
                    });
                }
            }
        }
    }

    evaluate_correlations(evidence, &state);

    let denominator = evidence.coverage_denominator();
    let required_matched = evidence
        .events
        .iter()
        .filter(|e| !e.is_optional)
        .filter(|e| state.matches.get(&e.id).is_some_and(|m| m.len() >= e.min_count as usize))
        .count();
    let correlations_matched = evidence.correlations.iter().filter(|c| c.is_met).count();
    let numerator = required_matched + correlations_matched;

    let coverage = if denominator == 0 { 1.0 } else { numerator as f64 / denominator as f64 };
    let verdict = MatchVerdict::from_coverage(coverage);

    Ok((state, verdict))
}

/// Renders the compact telemetry character string for a completed pass:
/// one character per expected event kind, angle-bracketed when the
/// expectation was not satisfied.
#[must_use]
pub fn render_match_string(evidence: &ExpectedEvidence, state: &ExtractState) -> String {
    let mut out = String::new();
    for expected in &evidence.events {
        let matched = state.matches.get(&expected.id).is_some_and(|m| !m.is_empty());
        let code = expected.kind.char_code();
        if matched {
            out.push(code);
        } else if !expected.is_optional {
            out.push('<');
            out.push(code);
            out.push('>');
        }
    }
    for correlation in &evidence.correlations {
        if correlation.is_met {
            out.push('C');
        } else {
            out.push_str("<C>");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventKind;
    use crate::model::ExpectedEvent;
    use crate::model::FieldPredicate;
    use crate::model::FileAction;
    use crate::model::FileFields;
    use crate::model::PredicateOp;
    use std::collections::BTreeMap;

    fn evidence_with(events: Vec<crate::model::ExpectedEvent>) -> ExpectedEvidence {
        ExpectedEvidence {
            technique_id: crate::model::TechniqueId::new("T1562.004"),
            test_ref: crate::model::TestIndexOrGuid::Index(7),
            display_name: "x".to_string(),
            platform: None,
            args: BTreeMap::new(),
            events,
            correlations: vec![],
            infos: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn file_subkind_mapping_matches_spec_scenario() {
        let expected = ExpectedEvent {
            id: "e0".to_string(),
            kind: EventKind::File,
            sub_kind: Some("WRITE".to_string()),
            field_predicates: vec![FieldPredicate {
                field: "path".to_string(),
                op: PredicateOp::Contains,
                value: "/etc/ufw/ufw.conf".to_string(),
            }],
            is_optional: false,
            min_count: 1,
        };

        let open_write = NormalizedEvent {
            timestamp_ns: 1,
            mitre_techniques: vec![],
            payload: EventPayload::File(FileFields {
                action: FileAction::OpenWrite,
                exit_code: 0,
                target_path: "/etc/ufw/ufw.conf".to_string(),
                dest_path: None,
                perm_flags: None,
                pid: None,
                unique_pid: None,
                exe_path: None,
            }),
        };
        let (satisfied, total) = check_event_against_expected(&open_write, &expected).unwrap().unwrap();
        assert_eq!((satisfied, total), (1, 1));

        let rename = NormalizedEvent {
            timestamp_ns: 2,
            mitre_techniques: vec![],
            payload: EventPayload::File(FileFields {
                action: FileAction::Rename,
                exit_code: 0,
                target_path: "/etc/ufw/ufw.conf.bak".to_string(),
                dest_path: Some("/etc/ufw/ufw.conf".to_string()),
                perm_flags: None,
                pid: None,
                unique_pid: None,
                exe_path: None,
            }),
        };
        let (satisfied, total) = check_event_against_expected(&rename, &expected).unwrap().unwrap();
        assert_eq!((satisfied, total), (1, 1));

        let open_read = NormalizedEvent {
            timestamp_ns: 3,
            mitre_techniques: vec![],
            payload: EventPayload::File(FileFields {
                action: FileAction::OpenRead,
                exit_code: 0,
                target_path: "/etc/ufw/ufw.conf".to_string(),
                dest_path: None,
                perm_flags: None,
                pid: None,
                unique_pid: None,
                exe_path: None,
            }),
        };
        assert!(check_event_against_expected(&open_read, &expected).unwrap().is_none());
    }

    #[test]
    fn coverage_reaches_one_for_fully_matched_evidence() {
        let mut evidence = evidence_with(vec![ExpectedEvent {
            id: "e0".to_string(),
            kind: EventKind::Process,
            sub_kind: None,
            field_predicates: vec![FieldPredicate {
                field: "cmdline".to_string(),
                op: PredicateOp::Contains,
                value: "tar czf".to_string(),
            }],
            is_optional: false,
            min_count: 1,
        }]);
        let events = vec![NormalizedEvent {
            timestamp_ns: 3,
            mitre_techniques: vec![],
            payload: EventPayload::Process(crate::model::ProcessFields {
                cmdline: "tar czf /tmp/x .".to_string(),
                pid: 1,
                ..crate::model::ProcessFields::default()
            }),
        }];
        let gates = AttributionGates::default();
        let (_, verdict) = run_matcher_pass(&mut evidence, &events, gates, "T1027", 1, "/tmp/x").unwrap();
        assert_eq!(verdict.status, TestStatus::Validated);
        assert!((verdict.coverage - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn opaque_kinds_match_through_their_preserved_evt_type_tag() {
        let expected = ExpectedEvent {
            id: "e0".to_string(),
            kind: EventKind::Module,
            sub_kind: None,
            field_predicates: vec![FieldPredicate {
                field: "module_path".to_string(),
                op: PredicateOp::Contains,
                value: "evil.so".to_string(),
            }],
            is_optional: false,
            min_count: 1,
        };

        let mut raw = serde_json::Map::new();
        raw.insert("module_path".to_string(), serde_json::Value::String("/tmp/evil.so".to_string()));
        let module_load = NormalizedEvent {
            timestamp_ns: 1,
            mitre_techniques: vec![],
            payload: EventPayload::Other(crate::model::OtherFields { evt_type: "M".to_string(), raw }),
        };
        let (satisfied, total) = check_event_against_expected(&module_load, &expected).unwrap().unwrap();
        assert_eq!((satisfied, total), (1, 1));

        let alert = NormalizedEvent {
            timestamp_ns: 2,
            mitre_techniques: vec![],
            payload: EventPayload::Other(crate::model::OtherFields {
                evt_type: "W".to_string(),
                raw: serde_json::Map::new(),
            }),
        };
        assert!(check_event_against_expected(&alert, &expected).unwrap().is_none());
    }
}
