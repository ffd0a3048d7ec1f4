//! Condition evaluation: one visibility verdict per field
//!
//! Two condition families combine by AND:
//! - **direct** conditions, declared on the field itself, short-circuit
//!   on the first failure;
//! - **inverse** conditions, declared on other nodes but targeting this
//!   field, are all evaluated: an unsatisfied Show hides the field, a
//!   satisfied Hide hides the field.
//!
//! Failure policy: an unresolvable operand never errors. It evaluates
//! to `false` for positive comparisons and `true` for emptiness checks,
//! so missing data degrades predictably instead of breaking the form.

use crate::node::{Condition, ConditionAction};
use crate::resolve::{parse_token, RefToken};
use crate::state::{mirror_formula_key, FormState};
use crate::value::Value;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Comparison operators shared by visibility conditions and lookup
/// filters. Serde aliases accept both the snake_case and camelCase
/// spellings found in stored configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[default]
    Equals,
    #[serde(alias = "notEquals")]
    NotEquals,
    Contains,
    #[serde(alias = "notContains")]
    NotContains,
    #[serde(alias = "greaterThan")]
    GreaterThan,
    #[serde(alias = "lessThan")]
    LessThan,
    #[serde(alias = "greaterOrEqual")]
    GreaterOrEqual,
    #[serde(alias = "lessOrEqual")]
    LessOrEqual,
    #[serde(alias = "isEmpty")]
    IsEmpty,
    #[serde(alias = "isNotEmpty")]
    IsNotEmpty,
}

/// Evaluate `lhs op rhs` under the engine's loose comparison rules:
/// case-insensitive trimmed equality with `" ; "` multi-value support,
/// numeric ordering when both sides parse, string ordering otherwise.
pub fn compare(lhs: &Value, op: CompareOp, rhs: &Value) -> bool {
    match op {
        CompareOp::IsEmpty => lhs.is_empty(),
        CompareOp::IsNotEmpty => !lhs.is_empty(),
        _ if lhs.is_empty() => false,
        CompareOp::Equals => eq_loose(lhs, rhs),
        CompareOp::NotEquals => !eq_loose(lhs, rhs),
        CompareOp::Contains => contains_loose(lhs, rhs),
        CompareOp::NotContains => !contains_loose(lhs, rhs),
        CompareOp::GreaterThan => ordered(lhs, rhs, |o| o == std::cmp::Ordering::Greater),
        CompareOp::LessThan => ordered(lhs, rhs, |o| o == std::cmp::Ordering::Less),
        CompareOp::GreaterOrEqual => ordered(lhs, rhs, |o| o != std::cmp::Ordering::Less),
        CompareOp::LessOrEqual => ordered(lhs, rhs, |o| o != std::cmp::Ordering::Greater),
    }
}

fn normalize(v: &Value) -> String {
    v.as_text().trim().to_lowercase()
}

/// Case-insensitive trimmed equality; a `" ; "`-delimited left side is
/// matched segment-wise with prefix semantics.
fn eq_loose(lhs: &Value, rhs: &Value) -> bool {
    let left = normalize(lhs);
    let right = normalize(rhs);
    if left == right {
        return true;
    }
    if left.contains(" ; ") {
        return left
            .split(" ; ")
            .map(str::trim)
            .any(|segment| segment == right || segment.starts_with(&right));
    }
    false
}

fn contains_loose(haystack: &Value, needle: &Value) -> bool {
    normalize(haystack).contains(&normalize(needle))
}

/// Numeric comparison when both operands parse as numbers, string
/// comparison otherwise
fn ordered(lhs: &Value, rhs: &Value, check: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).map(&check).unwrap_or(false),
        _ => check(normalize(lhs).cmp(&normalize(rhs))),
    }
}

/// Resolve a condition operand. Unlike the general reference resolver,
/// a missing key yields `Null` (absent) here, so emptiness checks on
/// unresolved data come out `true` and positive comparisons `false`.
pub(crate) fn resolve_operand(raw: &str, state: &FormState) -> Value {
    match parse_token(raw) {
        RefToken::Literal(text) => Value::Text(text.to_string()),
        RefToken::Field(id) | RefToken::Formula(id) => state.get(id).cloned().unwrap_or_default(),
        RefToken::Calculated(id) => state
            .get(id)
            .filter(|v| !v.is_empty())
            .cloned()
            .or_else(|| state.get(&mirror_formula_key(id)).cloned())
            .unwrap_or_default(),
        RefToken::Column(name) => Value::Text(name.to_string()),
        RefToken::Bare(text) => state.get(text).cloned().unwrap_or_default(),
    }
}

/// Whether one condition's predicate holds against the current state
pub fn predicate_holds(condition: &Condition, state: &FormState) -> bool {
    let resolved = resolve_operand(&condition.depends_on, state);
    compare(&resolved, condition.operator, &condition.compare_value)
}

/// Combine a field's direct conditions and the inverse conditions
/// targeting it into one visibility verdict.
///
/// Direct conditions AND together and short-circuit on first failure.
/// Inverse conditions are all evaluated; any unsatisfied Show or any
/// satisfied Hide hides the field.
pub fn evaluate_visibility(
    direct: &[Condition],
    inverse: &[Condition],
    state: &FormState,
) -> bool {
    for condition in direct {
        let holds = predicate_holds(condition, state);
        let hidden = match condition.action {
            ConditionAction::Show => !holds,
            ConditionAction::Hide => holds,
        };
        if hidden {
            tracing::trace!(depends_on = %condition.depends_on, "direct condition hides field");
            return false;
        }
    }

    let mut visible = true;
    for condition in inverse {
        let holds = predicate_holds(condition, state);
        match condition.action {
            ConditionAction::Show if !holds => visible = false,
            ConditionAction::Hide if holds => visible = false,
            _ => {}
        }
    }
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConditionDirection;
    use rstest::rstest;

    fn cond(depends_on: &str, op: CompareOp, value: &str, action: ConditionAction) -> Condition {
        Condition {
            depends_on: depends_on.into(),
            operator: op,
            compare_value: Value::from(value),
            action,
            direction: ConditionDirection::Direct,
            target_node_id: None,
        }
    }

    #[rstest]
    #[case("Oui", "oui", true)]
    #[case("  Oui  ", "OUI", true)]
    #[case("Non", "oui", false)]
    fn test_equals_case_insensitive_trimmed(
        #[case] lhs: &str,
        #[case] rhs: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            compare(&Value::from(lhs), CompareOp::Equals, &Value::from(rhs)),
            expected
        );
    }

    #[test]
    fn test_equals_multi_value_segments() {
        let stored = Value::from("Toiture plate ; Toiture inclinée");
        assert!(compare(&stored, CompareOp::Equals, &Value::from("toiture plate")));
        assert!(compare(&stored, CompareOp::Equals, &Value::from("Toiture inclinée")));
        assert!(!compare(&stored, CompareOp::Equals, &Value::from("Façade")));
    }

    #[test]
    fn test_numeric_comparison_with_string_fallback() {
        assert!(compare(
            &Value::from("10"),
            CompareOp::GreaterThan,
            &Value::from("9")
        ));
        // Not numbers: falls back to string ordering ("b" > "a")
        assert!(compare(
            &Value::from("b"),
            CompareOp::GreaterThan,
            &Value::from("a")
        ));
    }

    #[test]
    fn test_missing_operand_policy() {
        // Positive comparison on absent data: false
        assert!(!compare(&Value::Null, CompareOp::Equals, &Value::from("x")));
        assert!(!compare(&Value::Null, CompareOp::GreaterThan, &Value::from("1")));
        // Emptiness check on absent data: true
        assert!(compare(&Value::Null, CompareOp::IsEmpty, &Value::Null));
    }

    #[test]
    fn test_direct_and_semantics_short_circuit() {
        let mut state = FormState::new();
        state.set_local("a", Value::from("yes"));
        state.set_local("b", Value::from("no"));

        let both = vec![
            cond("a", CompareOp::Equals, "yes", ConditionAction::Show),
            cond("b", CompareOp::Equals, "yes", ConditionAction::Show),
        ];
        assert!(!evaluate_visibility(&both, &[], &state));

        let first_only = vec![cond("a", CompareOp::Equals, "yes", ConditionAction::Show)];
        assert!(evaluate_visibility(&first_only, &[], &state));
    }

    #[test]
    fn test_inverse_show_hides_when_unsatisfied() {
        let mut state = FormState::new();
        state.set_local("X", Value::from("no"));

        let inverse = vec![cond("X", CompareOp::Equals, "yes", ConditionAction::Show)];
        assert!(!evaluate_visibility(&[], &inverse, &state));

        state.set_local("X", Value::from("yes"));
        assert!(evaluate_visibility(&[], &inverse, &state));
    }

    #[test]
    fn test_inverse_hide_hides_when_satisfied() {
        let mut state = FormState::new();
        state.set_local("X", Value::from("yes"));

        let inverse = vec![cond("X", CompareOp::Equals, "yes", ConditionAction::Hide)];
        assert!(!evaluate_visibility(&[], &inverse, &state));

        state.set_local("X", Value::from("no"));
        assert!(evaluate_visibility(&[], &inverse, &state));
    }

    #[test]
    fn test_direct_hide_action() {
        let mut state = FormState::new();
        state.set_local("mode", Value::from("expert"));

        let direct = vec![cond("mode", CompareOp::Equals, "expert", ConditionAction::Hide)];
        assert!(!evaluate_visibility(&direct, &[], &state));
    }

    #[test]
    fn test_no_conditions_defaults_visible() {
        let state = FormState::new();
        assert!(evaluate_visibility(&[], &[], &state));
    }
}
