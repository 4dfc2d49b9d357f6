// telemetry-gate-core/tests/predicate_roundtrip.rs
// ============================================================================
// Property test: round-trip predicate parse.
// ============================================================================

use proptest::prelude::*;
use telemetry_gate_core::loader::criteria::parse_criteria;
use telemetry_gate_core::model::FieldPredicate;
use telemetry_gate_core::model::PredicateOp;

fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,10}".prop_map(String::from)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_/. -]{1,20}".prop_filter("must not end in * or ~", |s| {
        !s.ends_with('*') && !s.ends_with('~')
    })
}

fn op_strategy() -> impl Strategy<Value = PredicateOp> {
    prop_oneof![
        Just(PredicateOp::Equals),
        Just(PredicateOp::Contains),
        Just(PredicateOp::Regex),
    ]
}

proptest! {
    #[test]
    fn roundtrip_predicate_cell(field in field_name_strategy(), op in op_strategy(), value in value_strategy()) {
        let predicate = FieldPredicate { field, op, value };
        let cell = predicate.to_cell();
        let csv = format!("T1027,linux,1,Test\n_E_,Process,{cell}\n");
        let (blocks, warnings) = parse_criteria(&csv);
        prop_assert!(warnings.is_empty());
        let reparsed = &blocks[0].events[0].field_predicates[0];
        prop_assert_eq!(reparsed, &predicate);
    }
}
