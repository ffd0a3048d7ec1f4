//! Property-based tests for the evaluation invariants
//!
//! Uses proptest to generate random states, option sets and filter
//! references and verify the laws the engine promises.

use proptest::prelude::*;
use tbl_engine::lookup::run_lookup;
use tbl_engine::table::{
    FilterCondition, FilterConfig, LookupConfig, TableCapability, TableDataset,
};
use tbl_engine::{
    compare, evaluate_visibility, options_signature, AutoSelection, CompareOp, Condition,
    ConditionAction, ConditionDirection, FormState, OptionItem, SelectionAction, Value,
};

fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000.0f64..1000.0).prop_map(Value::Number),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::Text),
    ]
}

fn any_op() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Equals),
        Just(CompareOp::NotEquals),
        Just(CompareOp::Contains),
        Just(CompareOp::NotContains),
        Just(CompareOp::GreaterThan),
        Just(CompareOp::LessThan),
        Just(CompareOp::GreaterOrEqual),
        Just(CompareOp::LessOrEqual),
        Just(CompareOp::IsEmpty),
        Just(CompareOp::IsNotEmpty),
    ]
}

fn any_options() -> impl Strategy<Value = Vec<OptionItem>> {
    prop::collection::vec("[a-z]{1,8}", 0..6).prop_map(|values| {
        values
            .into_iter()
            .map(|v| OptionItem::new(v.clone(), v))
            .collect()
    })
}

fn ups_dataset() -> TableDataset {
    serde_json::from_value(serde_json::json!({
        "columns": ["Modèle", "KVA"],
        "rows": [],
        "data": [["Small", 5], ["Medium", 10], ["Big", 20]],
        "type": "columns"
    }))
    .unwrap()
}

fn capability(filters: Option<FilterConfig>) -> TableCapability {
    TableCapability {
        table_reference: Some("tbl".into()),
        lookup: LookupConfig {
            key_column: Some("Modèle".into()),
            filter_conditions: filters,
            ..Default::default()
        },
    }
}

proptest! {
    #[test]
    fn compare_is_total(lhs in any_value(), op in any_op(), rhs in any_value()) {
        // Any operand pair yields a verdict without panicking.
        let _ = compare(&lhs, op, &rhs);
    }

    #[test]
    fn emptiness_checks_are_complements(v in any_value()) {
        prop_assert_ne!(
            compare(&v, CompareOp::IsEmpty, &Value::Null),
            compare(&v, CompareOp::IsNotEmpty, &Value::Null)
        );
    }

    #[test]
    fn empty_lhs_fails_every_positive_comparison(op in any_op(), rhs in any_value()) {
        if !matches!(op, CompareOp::IsEmpty | CompareOp::IsNotEmpty) {
            prop_assert!(!compare(&Value::Null, op, &rhs));
        }
    }

    #[test]
    fn direct_conditions_are_monotone(values in prop::collection::vec("[a-z]{1,6}", 1..5), flip in 0usize..5) {
        // All conditions satisfied, then one flipped to unsatisfied:
        // visibility can only go from true to false.
        let mut state = FormState::new();
        let mut conditions = Vec::new();
        for (i, v) in values.iter().enumerate() {
            state.set_local(format!("f{i}"), Value::from(v.as_str()));
            conditions.push(Condition {
                depends_on: format!("f{i}"),
                operator: CompareOp::Equals,
                compare_value: Value::from(v.as_str()),
                action: ConditionAction::Show,
                direction: ConditionDirection::Direct,
                target_node_id: None,
            });
        }
        prop_assert!(evaluate_visibility(&conditions, &[], &state));

        let flip = flip % values.len();
        state.set_local(format!("f{flip}"), Value::from("__other__"));
        prop_assert!(!evaluate_visibility(&conditions, &[], &state));
    }

    #[test]
    fn filtered_options_subset_of_unfiltered(load in -50.0f64..50.0) {
        let mut state = FormState::new();
        state.set_local("load", Value::Number(load));

        let filters = FilterConfig {
            enabled: true,
            conditions: vec![FilterCondition {
                id: "c1".into(),
                filter_by_column: Some("KVA".into()),
                operator: CompareOp::GreaterOrEqual,
                compare_with_ref: Some("@value.load".into()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let unfiltered = run_lookup("f", &capability(None), &ups_dataset(), &state);
        let filtered = run_lookup("f", &capability(Some(filters)), &ups_dataset(), &state);

        prop_assert!(filtered.options.len() <= unfiltered.options.len());
        for option in &filtered.options {
            prop_assert!(unfiltered.options.iter().any(|o| o.value == option.value));
        }
    }

    #[test]
    fn signature_deterministic(options in any_options()) {
        prop_assert_eq!(options_signature(&options), options_signature(&options));
    }

    #[test]
    fn reconcile_converges_in_one_step(options in any_options(), current in "[a-z]{0,8}") {
        let mut ctl = AutoSelection::default();
        let mut value = Value::from(current.as_str());

        let action = ctl.reconcile(&options, &value, false);
        match &action {
            SelectionAction::Keep => {}
            SelectionAction::Clear => value = Value::Null,
            SelectionAction::Select(v) => value = Value::from(v.as_str()),
        }

        // After applying the decision, the next pass is a no-op.
        prop_assert_eq!(ctl.reconcile(&options, &value, false), SelectionAction::Keep);
    }

    #[test]
    fn reconcile_result_is_valid(options in any_options(), current in "[a-z]{0,8}") {
        let mut ctl = AutoSelection::default();
        let action = ctl.reconcile(&options, &Value::from(current.as_str()), false);
        match action {
            SelectionAction::Select(v) => {
                prop_assert!(options.iter().any(|o| o.value == v));
            }
            SelectionAction::Clear => prop_assert!(options.is_empty()),
            SelectionAction::Keep => {}
        }
    }
}
