//! Table lookup engine: options for a lookup-backed SELECT
//!
//! Produces the list of valid `{label, value}` options for a field
//! whose choices come from a tabular dataset, applying conditional
//! filtering, column overrides, multiplier transforms, value caps and
//! alerts. Every failure path degrades: a missing dataset yields an
//! empty option list, a failed extraction yields `None`, and the engine
//! never errors mid-evaluation.

mod extract;
mod filter;

pub use extract::{extract_value_from_column, extract_value_from_row};
pub use filter::{
    collect_alerts, option_passes_filters, option_within_cap, resolve_active_column,
    rule_conditions_hold,
};

use crate::node::OptionItem;
use crate::state::FormState;
use crate::table::{Alert, DatasetKind, LookupConfig, TableCapability, TableDataset};
use crate::value::Value;
use regex::Regex;
use std::sync::OnceLock;

/// Result of one lookup pass
#[derive(Debug, Clone, Default)]
pub struct LookupOutcome {
    pub options: Vec<OptionItem>,
    pub alerts: Vec<Alert>,
    /// Column selected by the override rules, when any apply
    pub active_column: Option<String>,
}

/// Run the full lookup pipeline for one field
pub fn run_lookup(
    field_id: &str,
    capability: &TableCapability,
    dataset: &TableDataset,
    state: &FormState,
) -> LookupOutcome {
    if dataset.is_empty() {
        return LookupOutcome::default();
    }

    let config = &capability.lookup;
    let mut options = build_options(dataset, config);
    let mut alerts = Vec::new();
    let mut active_column = None;

    if let Some(filters) = config.filter_conditions.as_ref().filter(|f| f.enabled) {
        options.retain(|o| option_passes_filters(&o.value, filters, state, dataset, config));

        if let Some(cap_column) = &filters.cap_column {
            let siblings = sibling_selected_values(field_id, state);
            options.retain(|o| {
                filters.value_caps.iter().all(|cap| {
                    option_within_cap(&o.value, cap, cap_column, &siblings, state, dataset, config)
                })
            });
        }

        alerts = collect_alerts(filters, state);
        active_column = resolve_active_column(
            &filters.column_overrides,
            filters.default_column.as_deref(),
            state,
        );
    }

    tracing::debug!(
        field = field_id,
        options = options.len(),
        alerts = alerts.len(),
        "lookup pass complete"
    );

    LookupOutcome {
        options,
        alerts,
        active_column,
    }
}

/// Derive the unfiltered option list from the dataset
pub fn build_options(dataset: &TableDataset, config: &LookupConfig) -> Vec<OptionItem> {
    match dataset.kind {
        DatasetKind::Columns => columns_options(dataset, config),
        DatasetKind::Matrix => match &config.key_row {
            Some(key_row) => matrix_row_options(dataset, key_row),
            None => matrix_options(dataset, config),
        },
    }
}

/// Columns mode: one option per data row, keyed by the key column
fn columns_options(dataset: &TableDataset, config: &LookupConfig) -> Vec<OptionItem> {
    let key_idx = match &config.key_column {
        Some(name) => match dataset.column_index(name) {
            Some(idx) => idx,
            None => return Vec::new(),
        },
        None => 0,
    };
    let value_idx = config
        .value_column
        .as_deref()
        .and_then(|c| dataset.column_index(c))
        .unwrap_or(key_idx);
    let display_idx = config
        .display_column
        .as_deref()
        .and_then(|c| dataset.column_index(c))
        .unwrap_or(value_idx);

    dataset
        .data
        .iter()
        .filter_map(|row| {
            let key = row.get(key_idx).filter(|v| !v.is_empty())?;
            let label = row
                .get(display_idx)
                .filter(|v| !v.is_empty())
                .or_else(|| row.get(value_idx).filter(|v| !v.is_empty()))
                .unwrap_or(key);
            Some(OptionItem::new(key.as_text(), label.as_text()))
        })
        .collect()
}

/// Matrix mode with a key row: each cell of that row becomes an option
fn matrix_row_options(dataset: &TableDataset, key_row: &str) -> Vec<OptionItem> {
    let Some(row_idx) = dataset.row_index(key_row) else {
        return Vec::new();
    };
    let Some(data_row) = row_idx
        .checked_sub(1)
        .and_then(|idx| dataset.data.get(idx))
    else {
        return Vec::new();
    };

    data_row
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| OptionItem::new(v.as_text(), v.as_text()))
        .collect()
}

/// Default matrix mode: row headers become option values, the value
/// column's cells become labels
fn matrix_options(dataset: &TableDataset, config: &LookupConfig) -> Vec<OptionItem> {
    let value_idx = config
        .value_column
        .as_deref()
        .and_then(|c| dataset.column_index(c))
        .unwrap_or(1);

    dataset
        .rows
        .iter()
        .skip(1) // header row
        .enumerate()
        .filter(|(_, key)| !key.trim().is_empty())
        .map(|(data_idx, key)| {
            let label = dataset
                .cell(data_idx, value_idx)
                .filter(|v| !v.is_empty())
                .map(Value::as_text)
                .unwrap_or_else(|| key.clone());
            OptionItem::new(key.clone(), label)
        })
        .collect()
}

/// Tolerant extraction for payloads that ship pre-built options.
///
/// Accepts `value`/`key`/`id` for the stored value and
/// `label`/`display` for the label, skipping entries without a usable
/// value and synthesizing `Option N` labels when none is given.
pub fn sanitize_direct_options(raw_options: &[serde_json::Value]) -> Vec<OptionItem> {
    raw_options
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let obj = entry.as_object()?;
            let value = ["value", "key", "id"]
                .iter()
                .find_map(|k| obj.get(*k))
                .map(Value::from_json)
                .filter(|v| !v.is_empty())?;
            let label = ["label", "display"]
                .iter()
                .find_map(|k| obj.get(*k))
                .map(Value::from_json)
                .filter(|v| !v.is_empty())
                .map(|v| v.as_text())
                .unwrap_or_else(|| format!("Option {}", index + 1));
            let disabled = obj.get("disabled").and_then(serde_json::Value::as_bool);
            Some(OptionItem {
                value: value.as_text(),
                label,
                node_id: None,
                disabled,
            })
        })
        .collect()
}

fn suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-(\d{1,3})$").expect("valid suffix regex"))
}

/// Strip the numeric instance suffix of a repeated field id
pub fn base_field_id(field_id: &str) -> &str {
    match suffix_regex().find(field_id) {
        Some(m) => &field_id[..m.start()],
        None => field_id,
    }
}

/// Values already chosen by sibling instances of a repeated field
/// (same base id, different numeric suffix), excluding the field itself
pub fn sibling_selected_values(field_id: &str, state: &FormState) -> Vec<String> {
    let base = base_field_id(field_id);
    state
        .keys()
        .filter(|key| key.as_str() != field_id)
        .filter(|key| {
            key.as_str() == base
                || key
                    .strip_prefix(base)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .is_some_and(|digits| {
                        (1..=3).contains(&digits.len())
                            && digits.chars().all(|c| c.is_ascii_digit())
                    })
        })
        .filter_map(|key| state.get(key))
        .filter(|v| !v.is_empty())
        .map(Value::as_text)
        .collect()
}
