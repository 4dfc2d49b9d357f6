// telemetry-gate-core/tests/loader_planner_matcher.rs
// ============================================================================
// Integration tests: catalog/criteria loading, joining, selector planning,
// and a full matcher pass end to end.
// ============================================================================

use telemetry_gate_core::loader::catalog::parse_catalog_index;
use telemetry_gate_core::loader::criteria::parse_criteria;
use telemetry_gate_core::loader::join::join_catalog_and_criteria;
use telemetry_gate_core::loader::join::JoinOutcome;
use telemetry_gate_core::matcher::attribution::AttributionGates;
use telemetry_gate_core::matcher::coverage::run_matcher_pass;
use telemetry_gate_core::model::Dependency;
use telemetry_gate_core::model::EventPayload;
use telemetry_gate_core::model::Executor;
use telemetry_gate_core::model::ExecutorKind;
use telemetry_gate_core::model::NormalizedEvent;
use telemetry_gate_core::model::Platform;
use telemetry_gate_core::model::ProcessFields;
use telemetry_gate_core::model::TechniqueId;
use telemetry_gate_core::model::TestCase;
use telemetry_gate_core::model::TestGuid;
use telemetry_gate_core::model::TestStatus;
use telemetry_gate_core::planner::plan_tests;
use telemetry_gate_core::planner::Selector;

fn sample_catalog() -> Vec<TestCase> {
    vec![TestCase {
        technique_id: TechniqueId::new("T1027"),
        test_index: 1,
        test_guid: TestGuid::new("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
        display_name: "Obfuscated Files or Information".to_string(),
        supported_platforms: [Platform::Linux].into_iter().collect(),
        input_args: vec![],
        executor: Executor {
            kind: Some(ExecutorKind::Sh),
            raw_name: "sh".to_string(),
            command: "echo #{message}".to_string(),
            cleanup_command: None,
            elevation_required: false,
        },
        dependency_executor_name: None,
        dependencies: vec![Dependency {
            description: "requires jq".to_string(),
            check_script: "which jq".to_string(),
            install_script: "apt-get install -y jq".to_string(),
        }],
        auto_generated_guid: false,
    }]
}

const CRITERIA_CSV: &str = "\
T1027,linux,1,Obfuscated Files or Information
_E_,Process,cmdline~=echo hello
";

#[test]
fn catalog_index_parses_and_dedups() {
    let csv = "Tactic,TechniqueId,TechniqueName,TestIndex,TestName,TestGuid,Executor\n\
Defense Evasion,T1027,Obfuscated Files,1,Test One,aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa,sh\n";
    let rows = parse_catalog_index(csv);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].technique_id.as_str(), "T1027");
}

#[test]
fn full_pipeline_loads_plans_and_matches() {
    let catalog = sample_catalog();
    let (criteria, warnings) = parse_criteria(CRITERIA_CSV);
    assert!(warnings.is_empty());

    let outcomes = join_catalog_and_criteria(&catalog, &criteria);
    let joined: Vec<_> = outcomes
        .into_iter()
        .filter_map(|o| match o {
            JoinOutcome::Joined(j) => Some(j),
            _ => None,
        })
        .collect();
    assert_eq!(joined.len(), 1);
    assert!(joined[0].evidence.is_some());

    let selectors = vec![Selector::parse("T1027").unwrap()];
    let planned = plan_tests(&selectors, &joined);
    assert_eq!(planned.len(), 1);

    let mut evidence = planned[0].joined.evidence.clone().unwrap();
    let events = vec![NormalizedEvent {
        timestamp_ns: 1,
        mitre_techniques: vec!["T1027".to_string()],
        payload: EventPayload::Process(ProcessFields {
            cmdline: "echo hello world".to_string(),
            pid: 42,
            ..ProcessFields::default()
        }),
    }];
    let (_, verdict) = run_matcher_pass(&mut evidence, &events, AttributionGates::default(), "T1027", 1, "/tmp/x").unwrap();
    assert_eq!(verdict.status, TestStatus::Validated);
}
