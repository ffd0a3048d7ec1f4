//! Conditional filtering, multiplier transforms, overrides, caps, alerts
//!
//! Per-option filter conditions compare a table-derived value against a
//! reference resolved from FormState. The asymmetry is deliberate and
//! mirrors the server: an empty *reference* makes the condition inert
//! (passes), while a failed *table extraction* rejects the option.

use super::extract::{extract_value_from_column, extract_value_from_row};
use crate::conditions::{compare, resolve_operand, CompareOp};
use crate::state::FormState;
use crate::table::{
    Alert, ColumnOverride, FilterCondition, FilterConfig, FilterLogic, LookupConfig, Multiplier,
    MultiplierMode, RuleCondition, TableDataset, ValueCap,
};
use crate::value::Value;

/// Whether one option passes all of a filter block's conditions,
/// combined by the block's filter logic
pub fn option_passes_filters(
    option_value: &str,
    filters: &FilterConfig,
    state: &FormState,
    dataset: &TableDataset,
    config: &LookupConfig,
) -> bool {
    if filters.conditions.is_empty() {
        return true;
    }

    let mut results = filters
        .conditions
        .iter()
        .map(|c| condition_passes(option_value, c, state, dataset, config));

    match filters.filter_logic {
        FilterLogic::And => results.all(|passed| passed),
        FilterLogic::Or => results.any(|passed| passed),
    }
}

fn condition_passes(
    option_value: &str,
    condition: &FilterCondition,
    state: &FormState,
    dataset: &TableDataset,
    config: &LookupConfig,
) -> bool {
    let reference = condition
        .compare_with_ref
        .as_deref()
        .map(|raw| resolve_filter_reference(raw, option_value, state, dataset, config))
        .unwrap_or_default();

    // Filters are inert on empty input
    if reference.is_empty() {
        return true;
    }

    let mut table_values = Vec::new();
    if let Some(column) = &condition.filter_by_column {
        if let Some(v) = extract_value_from_column(option_value, column, dataset, config) {
            table_values.push(v);
        }
    }
    if let Some(row) = &condition.filter_by_row {
        if let Some(v) = extract_value_from_row(option_value, row, dataset, config) {
            table_values.push(v);
        }
    }

    // Nothing extracted: the option has no data to judge, reject it
    if table_values.is_empty() {
        return false;
    }

    // Column AND row when both present
    table_values.into_iter().all(|table_value| {
        let transformed = apply_multiplier(
            condition.multiplier.as_ref(),
            table_value,
            option_value,
            state,
            dataset,
            config,
        );
        match condition.operator {
            // Substring tests treat the table value as the haystack
            CompareOp::Contains | CompareOp::NotContains => {
                compare(&transformed, condition.operator, &reference)
            }
            op => compare(&reference, op, &transformed),
        }
    })
}

/// `@column.<name>` reads the named column for the option under
/// evaluation; everything else goes through the operand resolver.
fn resolve_filter_reference(
    raw: &str,
    option_value: &str,
    state: &FormState,
    dataset: &TableDataset,
    config: &LookupConfig,
) -> Value {
    if let Some(column) = raw.strip_prefix("@column.") {
        return extract_value_from_column(option_value, column, dataset, config)
            .unwrap_or_default();
    }
    resolve_operand(raw, state)
}

/// Rewrite a table value through a condition's multiplier block
fn apply_multiplier(
    multiplier: Option<&Multiplier>,
    table_value: Value,
    option_value: &str,
    state: &FormState,
    dataset: &TableDataset,
    config: &LookupConfig,
) -> Value {
    let Some(mult) = multiplier.filter(|m| m.enabled) else {
        return table_value;
    };

    // AND-combined sub-conditions pick the branch; no conditions means
    // the then-branch applies unconditionally
    let matched = mult.conditions.iter().all(|c| {
        let a = resolve_operand(&c.field_a, state);
        let b = resolve_operand(&c.field_b, state);
        compare(&a, c.operator, &b)
    });

    let factor = if matched {
        mult.factor
    } else {
        mult.else_factor
    };
    let Some(factor) = factor else {
        return table_value;
    };

    match mult.mode {
        MultiplierMode::Fixed => Value::Number(factor),
        MultiplierMode::Multiply => {
            // Optionally re-read the value from a different column first
            let base = match &mult.source_column {
                Some(column) => {
                    extract_value_from_column(option_value, column, dataset, config)
                        .unwrap_or(table_value)
                }
                None => table_value,
            };
            match base.as_number() {
                Some(n) => Value::Number(n * factor),
                None => base,
            }
        }
    }
}

/// AND-combined guard conditions shared by overrides, caps and alerts
pub fn rule_conditions_hold(conditions: &[RuleCondition], state: &FormState) -> bool {
    conditions.iter().all(|c| {
        let resolved = resolve_operand(&c.field_ref, state);
        compare(&resolved, c.operator, &c.value)
    })
}

/// First enabled override whose conditions hold wins; otherwise the
/// default column applies.
pub fn resolve_active_column(
    overrides: &[ColumnOverride],
    default_column: Option<&str>,
    state: &FormState,
) -> Option<String> {
    overrides
        .iter()
        .find(|o| o.enabled && rule_conditions_hold(&o.conditions, state))
        .map(|o| o.target_column.clone())
        .or_else(|| default_column.map(String::from))
}

/// Whether one option survives an active value cap.
///
/// `per_unit` judges the option's own cap-column value; `total` adds it
/// to the running sum across sibling instances already chosen in
/// FormState.
pub fn option_within_cap(
    option_value: &str,
    cap: &ValueCap,
    cap_column: &str,
    sibling_values: &[String],
    state: &FormState,
    dataset: &TableDataset,
    config: &LookupConfig,
) -> bool {
    if !cap.enabled || !rule_conditions_hold(&cap.conditions, state) {
        return true;
    }

    let Some(option_amount) = extract_value_from_column(option_value, cap_column, dataset, config)
        .and_then(|v| v.as_number())
    else {
        // No cap data for this option: never reject on missing data
        return true;
    };

    match cap.scope {
        crate::table::CapScope::PerUnit => option_amount <= cap.max_value,
        crate::table::CapScope::Total => {
            let already: f64 = sibling_values
                .iter()
                .filter_map(|v| {
                    extract_value_from_column(v, cap_column, dataset, config)
                        .and_then(|v| v.as_number())
                })
                .sum();
            already + option_amount <= cap.max_value
        }
    }
}

/// Advisories for every enabled alert whose conditions hold
pub fn collect_alerts(filters: &FilterConfig, state: &FormState) -> Vec<Alert> {
    filters
        .lookup_alerts
        .iter()
        .filter(|a| a.enabled && rule_conditions_hold(&a.conditions, state))
        .map(|a| Alert {
            message: a.message.clone(),
            level: a.level,
        })
        .collect()
}
