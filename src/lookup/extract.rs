//! Dataset extraction primitives
//!
//! Both orientations share one contract: given the option currently
//! being evaluated, read the cell of a named target column or row.
//! Any miss returns `None`; callers treat that as "no data", never as
//! an error.
//!
//! Matrix datasets keep their header row out of `data` (hence the row
//! index decrement) but keep a placeholder cell for the header column,
//! so column indices map directly.

use crate::table::{DatasetKind, LookupConfig, TableDataset};
use crate::value::Value;

/// Read `target_column`'s cell for the option currently being evaluated
pub fn extract_value_from_column(
    option_value: &str,
    target_column: &str,
    dataset: &TableDataset,
    config: &LookupConfig,
) -> Option<Value> {
    match dataset.kind {
        DatasetKind::Columns => {
            let key_idx = match &config.key_column {
                Some(name) => dataset.column_index(name)?,
                None => 0,
            };
            let target_idx = dataset.column_index(target_column)?;
            let row = dataset
                .data
                .iter()
                .find(|row| matches_key(row.get(key_idx), option_value))?;
            row.get(target_idx).cloned().filter(|v| !v.is_empty())
        }
        DatasetKind::Matrix => {
            let target_idx = dataset.column_index(target_column)?;

            // First try the option as a row value
            if let Some(row_idx) = dataset.row_index(option_value) {
                let data_row = row_idx.checked_sub(1)?;
                return dataset
                    .cell(data_row, target_idx)
                    .cloned()
                    .filter(|v| !v.is_empty());
            }

            // Fall back to the option as a column header; the value
            // still comes from the target column's first data cell,
            // decremented past the header placeholder
            dataset.column_index(option_value)?;
            let data_col = target_idx.checked_sub(1)?;
            dataset.cell(0, data_col).cloned().filter(|v| !v.is_empty())
        }
    }
}

/// Read `target_row`'s cell for the option currently being evaluated.
/// Not applicable to columns-oriented datasets.
pub fn extract_value_from_row(
    option_value: &str,
    target_row: &str,
    dataset: &TableDataset,
    config: &LookupConfig,
) -> Option<Value> {
    if dataset.kind == DatasetKind::Columns {
        return None;
    }

    let target_idx = dataset.row_index(target_row)?;
    let data_row = target_idx.checked_sub(1)?;

    if config.key_column.is_some() {
        // Option is a column header; read the intersection
        let option_col = dataset.column_index(option_value)?;
        return dataset
            .cell(data_row, option_col)
            .cloned()
            .filter(|v| !v.is_empty());
    }

    // Option is a row header; return a representative cell of the
    // target row (first non-empty)
    dataset.row_index(option_value)?;
    dataset
        .data
        .get(data_row)?
        .iter()
        .find(|v| !v.is_empty())
        .cloned()
}

fn matches_key(cell: Option<&Value>, option_value: &str) -> bool {
    cell.is_some_and(|v| v.as_text() == option_value)
}
