//! Tabular dataset and lookup configuration types
//!
//! A lookup-backed SELECT sources its options from a `TableDataset`.
//! The dataset comes in two orientations: `columns` (each data row is a
//! record, one column holds the option key) and `matrix` (row and
//! column headers, cells at the intersections). `LookupConfig` carries
//! everything the lookup engine needs: key column/row, display/value
//! columns, and the filter block with conditions, column overrides,
//! value caps and alerts.

use crate::conditions::CompareOp;
use crate::value::Value;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A resolved tabular dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TableDataset {
    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default)]
    pub rows: Vec<String>,

    /// Cell matrix; in matrix orientation the header row/column are not
    /// part of `data`, hence the index decrement during extraction.
    #[serde(default)]
    pub data: Vec<Vec<Value>>,

    #[serde(default, rename = "type")]
    pub kind: DatasetKind,
}

/// Dataset orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    #[default]
    Columns,
    Matrix,
}

impl TableDataset {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || (self.columns.is_empty() && self.rows.is_empty())
    }

    /// Index of a column header, by exact name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a row header, by exact name
    pub fn row_index(&self, name: &str) -> Option<usize> {
        self.rows.iter().position(|r| r == name)
    }

    /// Cell accessor tolerant of ragged rows
    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.data.get(row).and_then(|r| r.get(col))
    }
}

/// The table capability attached to a node
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TableCapability {
    /// Id of the dataset, resolved through the `DatasetProvider`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_reference: Option<String>,

    #[serde(default)]
    pub lookup: LookupConfig,
}

/// How options are derived from the dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LookupConfig {
    /// Column holding option keys (columns mode) or the column matched
    /// against option values (matrix mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,

    /// Row whose cells become the option values (matrix mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_row: Option<String>,

    /// Column read for the stored value, defaults to the key column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,

    /// Column read for the displayed label, defaults to the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_column: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_conditions: Option<FilterConfig>,
}

/// Filter block: per-option conditions plus the dynamic lookup rules
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FilterConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub conditions: Vec<FilterCondition>,

    #[serde(default)]
    pub filter_logic: FilterLogic,

    /// Conditional column switch; first matching override wins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_overrides: Vec<ColumnOverride>,

    /// Column used when no override matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_column: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_caps: Vec<ValueCap>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lookup_alerts: Vec<LookupAlert>,

    /// Column read by value caps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_column: Option<String>,
}

/// How multiple filter conditions combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

/// One per-option filter condition
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FilterCondition {
    #[serde(default)]
    pub id: String,

    /// Table column the condition reads for each option
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by_column: Option<String>,

    /// Table row the condition reads for each option
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by_row: Option<String>,

    #[serde(default)]
    pub operator: CompareOp,

    /// Reference token resolved against FormState
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_with_ref: Option<String>,

    /// Rewrites the table value before comparison
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<Multiplier>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Conditional multiplier / fixed-value transform
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Multiplier {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub mode: MultiplierMode,

    /// AND-combined sub-conditions selecting the then/else branch
    #[serde(default)]
    pub conditions: Vec<MultiplierCondition>,

    /// Then branch: factor (multiply) or replacement value (fixed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,

    /// Else branch counterpart of `factor`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub else_factor: Option<f64>,

    /// In multiply mode, re-read the table value from this column first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MultiplierMode {
    #[default]
    Multiply,
    Fixed,
}

/// `field_a op field_b`; both sides are reference tokens or literals
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MultiplierCondition {
    #[serde(default)]
    pub field_a: String,

    #[serde(default)]
    pub operator: CompareOp,

    #[serde(default)]
    pub field_b: String,
}

/// Condition guarding an override, cap or alert
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RuleCondition {
    /// Reference token resolved against FormState
    #[serde(default)]
    pub field_ref: String,

    #[serde(default)]
    pub operator: CompareOp,

    #[serde(default)]
    pub value: Value,
}

/// Switches the lookup to an alternate target column
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ColumnOverride {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub conditions: Vec<RuleCondition>,

    #[serde(default)]
    pub target_column: String,
}

/// Upper bound on a looked-up numeric value
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValueCap {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub conditions: Vec<RuleCondition>,

    pub max_value: f64,

    #[serde(default)]
    pub scope: CapScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CapScope {
    /// Running sum across sibling instances of a repeated field
    #[default]
    Total,
    /// Each option judged on its own cap-column value
    PerUnit,
}

/// Contextual advisory surfaced without filtering options
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LookupAlert {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub conditions: Vec<RuleCondition>,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub level: AlertLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Info,
    Warning,
    Error,
}

/// An advisory produced by a triggered alert rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Alert {
    pub message: String,
    pub level: AlertLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_dataset() -> TableDataset {
        serde_json::from_value(serde_json::json!({
            "columns": ["", "5kVA", "10kVA"],
            "rows": ["", "ModelX"],
            "data": [[null, 12, 20]],
            "type": "matrix"
        }))
        .unwrap()
    }

    #[test]
    fn test_dataset_deserializes_with_type_field() {
        let ds = matrix_dataset();
        assert_eq!(ds.kind, DatasetKind::Matrix);
        assert_eq!(ds.column_index("10kVA"), Some(2));
        assert_eq!(ds.cell(0, 2), Some(&Value::Number(20.0)));
    }

    #[test]
    fn test_filter_config_defaults() {
        let cfg: FilterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.filter_logic, FilterLogic::And);
        assert!(cfg.conditions.is_empty());
        assert!(cfg.value_caps.is_empty());
    }

    #[test]
    fn test_cap_scope_snake_case() {
        let per_unit: CapScope = serde_json::from_str(r#""per_unit""#).unwrap();
        assert_eq!(per_unit, CapScope::PerUnit);
        let total: CapScope = serde_json::from_str(r#""total""#).unwrap();
        assert_eq!(total, CapScope::Total);
    }
}
