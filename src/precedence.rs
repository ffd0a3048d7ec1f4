//! Capability precedence: which single source governs a field
//!
//! Strict order: link > data > value-formula > table > raw input.
//! Constraint formulas (those with a `target_property`) never reach the
//! formula branch; they only bound an otherwise-editable field. A
//! formula with `allow_manual_override` keeps the field editable even
//! though a computed value exists.

use crate::engine::CalculatedValueProvider;
use crate::node::{DataConfig, Node};
use crate::resolve::resolve_reference;
use crate::state::{mirror_formula_key, FormState};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// The source that governs a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoverningSource {
    Link,
    Data,
    Formula,
    Table,
    Input,
}

/// Outcome of precedence resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Governance {
    pub source: GoverningSource,
    pub read_only: bool,
    /// Value produced by the governing source, when it produces one
    pub value: Option<Value>,
}

/// Decide the governing source for a node
pub fn resolve_precedence(
    node: &Node,
    state: &FormState,
    calculated: &dyn CalculatedValueProvider,
) -> Governance {
    let caps = &node.capabilities;

    if let Some(link) = caps.link.as_ref().and_then(|c| c.active()) {
        let mirrored = state.get(&link.target_field).cloned().unwrap_or_default();
        return Governance {
            source: GoverningSource::Link,
            read_only: true,
            value: Some(mirrored),
        };
    }

    if let Some(data) = caps.data.as_ref().and_then(|c| c.active()) {
        let value = match data {
            DataConfig::Fixed { value } => value.clone(),
            DataConfig::Tree { reference } => {
                let resolved = resolve_reference(reference, state);
                // A reference that resolved to its own literal text is
                // unresolved; try the backend-computed value instead.
                if resolved.as_text() == strip_reference(reference) {
                    computed_value(node, state, calculated).unwrap_or(resolved)
                } else {
                    resolved
                }
            }
        };
        return Governance {
            source: GoverningSource::Data,
            read_only: true,
            value: Some(value),
        };
    }

    if let Some(formula) = caps.formula.as_ref().and_then(|c| c.active()) {
        if formula.target_property.is_none() {
            return Governance {
                source: GoverningSource::Formula,
                read_only: !formula.allow_manual_override,
                value: computed_value(node, state, calculated),
            };
        }
    }

    if caps.table.as_ref().and_then(|c| c.active()).is_some() {
        return Governance {
            source: GoverningSource::Table,
            read_only: false,
            value: None,
        };
    }

    Governance {
        source: GoverningSource::Input,
        read_only: false,
        value: None,
    }
}

/// A node's computed value: FormState, then the mirror aggregate key,
/// then the backend provider keyed by id and label.
pub fn computed_value(
    node: &Node,
    state: &FormState,
    calculated: &dyn CalculatedValueProvider,
) -> Option<Value> {
    state
        .get(&node.id)
        .filter(|v| !v.is_empty())
        .cloned()
        .or_else(|| {
            state
                .get(&mirror_formula_key(&node.id))
                .filter(|v| !v.is_empty())
                .cloned()
        })
        .or_else(|| calculated.value_for(&node.id))
        .or_else(|| calculated.value_for(&node.label))
}

fn strip_reference(reference: &str) -> String {
    crate::resolve::referenced_node_id(reference)
        .unwrap_or(reference)
        .to_string()
}
