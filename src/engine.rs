//! Evaluation engine: one pass over a field, in a fixed order
//!
//! For each field the engine decides, in order: visibility (direct and
//! inverse conditions), the governing value source, the option list
//! (lookup pipeline or declared options), the cascade tree, the
//! auto-selection action and the dynamic constraints. Evaluation is
//! pure over `FormState` plus the two provider traits; it never writes
//! state itself. Callers apply the returned `SelectionAction` and feed
//! the next pass.

use crate::autoselect::{AutoSelection, SelectionAction};
use crate::conditions::evaluate_visibility;
use crate::constraints::{extract_constraints, ConstraintSet};
use crate::hierarchy::{build_cascade, selected_terminal, CascadeLevel};
use crate::lookup::{base_field_id, extract_value_from_column, run_lookup};
use crate::node::{Condition, ConditionDirection, Node, NodeGraph, NodeType, OptionItem};
use crate::precedence::{resolve_precedence, Governance, GoverningSource};
use crate::state::FormState;
use crate::table::{Alert, TableDataset};
use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// Source of tabular datasets referenced by table capabilities
pub trait DatasetProvider {
    fn dataset(&self, table_id: &str) -> Option<TableDataset>;
}

/// Source of backend-computed values, keyed by node id or label
pub trait CalculatedValueProvider {
    fn value_for(&self, key: &str) -> Option<Value>;
}

/// Stub for trees that use neither datasets nor computed mirrors
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProviders;

impl DatasetProvider for NoProviders {
    fn dataset(&self, _table_id: &str) -> Option<TableDataset> {
        None
    }
}

impl CalculatedValueProvider for NoProviders {
    fn value_for(&self, _key: &str) -> Option<Value> {
        None
    }
}

/// In-memory datasets, handy for tests and static trees
#[derive(Debug, Clone, Default)]
pub struct StaticDatasets {
    datasets: HashMap<String, TableDataset>,
}

impl StaticDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table_id: impl Into<String>, dataset: TableDataset) {
        self.datasets.insert(table_id.into(), dataset);
    }
}

impl DatasetProvider for StaticDatasets {
    fn dataset(&self, table_id: &str) -> Option<TableDataset> {
        self.datasets.get(table_id).cloned()
    }
}

/// Mutable per-session evaluation context.
///
/// Everything the engine remembers between passes lives here, scoped
/// to one form session rather than to ambient globals.
#[derive(Debug, Default)]
pub struct SessionContext {
    selections: HashMap<String, AutoSelection>,
    recomputing: HashSet<String>,
    cascade_terminals: HashMap<String, String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the terminal node the user landed on in a field's
    /// cascade. The engine records flat selections itself; hosts call
    /// this when the user walks a deeper level.
    pub fn record_cascade_selection(
        &mut self,
        field_id: impl Into<String>,
        terminal_node_id: impl Into<String>,
    ) {
        self.cascade_terminals
            .insert(field_id.into(), terminal_node_id.into());
    }

    /// Terminal node id of the cascade path currently selected
    pub fn cascade_terminal(&self, field_id: &str) -> Option<&str> {
        self.cascade_terminals.get(field_id).map(String::as_str)
    }

    /// Mark a field's dataset as being recomputed server-side
    pub fn begin_recompute(&mut self, field_id: impl Into<String>) {
        self.recomputing.insert(field_id.into());
    }

    pub fn finish_recompute(&mut self, field_id: &str) {
        self.recomputing.remove(field_id);
    }

    pub fn is_recomputing(&self, field_id: &str) -> bool {
        self.recomputing.contains(field_id)
    }
}

/// Everything one pass decides about one field
#[derive(Debug, Clone)]
pub struct FieldEvaluation {
    pub field_id: String,
    pub visible: bool,
    pub governance: Governance,
    pub options: Vec<OptionItem>,
    pub cascade: Vec<CascadeLevel>,
    pub constraints: ConstraintSet,
    /// Rendered advisory when the effective value breaks a bound
    pub constraint_violation: Option<String>,
    pub alerts: Vec<Alert>,
    /// Effective lookup column after overrides
    pub active_column: Option<String>,
    pub selection: SelectionAction,
}

/// The evaluation engine for one node graph
pub struct Engine<'a> {
    graph: &'a NodeGraph,
    datasets: &'a dyn DatasetProvider,
    calculated: &'a dyn CalculatedValueProvider,
}

impl<'a> Engine<'a> {
    pub fn new(
        graph: &'a NodeGraph,
        datasets: &'a dyn DatasetProvider,
        calculated: &'a dyn CalculatedValueProvider,
    ) -> Self {
        Self {
            graph,
            datasets,
            calculated,
        }
    }

    /// Evaluate every field node in the graph
    pub fn evaluate_all(
        &self,
        state: &FormState,
        session: &mut SessionContext,
    ) -> Vec<FieldEvaluation> {
        self.graph
            .nodes
            .iter()
            .filter(|n| matches!(n.node_type, NodeType::LeafField | NodeType::LeafRepeater))
            .filter_map(|n| self.evaluate(&n.id, state, session))
            .collect()
    }

    /// Evaluate one field. `None` when the id is not in the graph.
    ///
    /// Repeated-field instance ids (`<id>-2`, `<id>-3`, ...) resolve
    /// their configuration through the base node while keeping their
    /// own FormState key.
    pub fn evaluate(
        &self,
        field_id: &str,
        state: &FormState,
        session: &mut SessionContext,
    ) -> Option<FieldEvaluation> {
        let node = self
            .graph
            .get(field_id)
            .or_else(|| self.graph.get(base_field_id(field_id)))?;
        let _span = tracing::debug_span!("evaluate", field = field_id).entered();

        let visible = self.field_visible(node, state);
        let mut governance = resolve_precedence(node, state, self.calculated);

        if !visible {
            return Some(FieldEvaluation {
                field_id: field_id.to_string(),
                visible: false,
                governance,
                options: Vec::new(),
                cascade: Vec::new(),
                constraints: ConstraintSet::default(),
                constraint_violation: None,
                alerts: Vec::new(),
                active_column: None,
                selection: SelectionAction::Keep,
            });
        }

        let mut options = node.options.clone();
        let mut alerts = Vec::new();
        let mut active_column = None;
        let mut selection = SelectionAction::Keep;

        if let Some(capability) = node.capabilities.table.as_ref().and_then(|c| c.active()) {
            let dataset = capability
                .table_reference
                .as_deref()
                .and_then(|id| self.datasets.dataset(id))
                .unwrap_or_default();

            let outcome = run_lookup(field_id, capability, &dataset, state);
            options = outcome.options;
            alerts = outcome.alerts;
            active_column = outcome.active_column;

            let current = state.get(field_id).cloned().unwrap_or_default();
            let in_flight = session.is_recomputing(field_id);
            selection = session
                .selections
                .entry(field_id.to_string())
                .or_default()
                .reconcile(&options, &current, in_flight);

            // A selected option reads its value through the effective
            // column, which feeds the Table governing source.
            if governance.source == GoverningSource::Table && governance.value.is_none() {
                let selected = match &selection {
                    SelectionAction::Select(value) => Some(value.clone()),
                    SelectionAction::Clear => None,
                    SelectionAction::Keep => Some(current.as_text()).filter(|t| !t.is_empty()),
                };
                if let Some(option_value) = selected {
                    let column = active_column
                        .as_deref()
                        .or(capability.lookup.value_column.as_deref());
                    governance.value = column.and_then(|col| {
                        extract_value_from_column(&option_value, col, &dataset, &capability.lookup)
                    });
                }
            }
        }

        let cascade = build_cascade(&options, self.graph);
        let chosen = match &selection {
            SelectionAction::Select(value) => Some(value.clone()),
            SelectionAction::Clear => None,
            SelectionAction::Keep => {
                Some(state.get(field_id).cloned().unwrap_or_default().as_text())
                    .filter(|t| !t.is_empty())
            }
        };
        if let Some(node_id) =
            chosen.as_deref().and_then(|v| selected_terminal(&cascade, v))
        {
            session.record_cascade_selection(field_id, node_id);
        }

        let constraints = extract_constraints(node, self.graph, state, self.calculated);
        let effective = governance
            .value
            .clone()
            .or_else(|| state.get(field_id).cloned())
            .unwrap_or_default();
        let constraint_violation = constraints.violation_message(&effective);

        Some(FieldEvaluation {
            field_id: field_id.to_string(),
            visible: true,
            governance,
            options,
            cascade,
            constraints,
            constraint_violation,
            alerts,
            active_column,
            selection,
        })
    }

    /// Apply a selection decision to the form state
    pub fn apply_selection(state: &mut FormState, field_id: &str, action: &SelectionAction) {
        match action {
            SelectionAction::Keep => {}
            SelectionAction::Clear => state.set_local(field_id, Value::Null),
            SelectionAction::Select(value) => {
                state.set_local(field_id, Value::Text(value.clone()))
            }
        }
    }

    fn field_visible(&self, node: &Node, state: &FormState) -> bool {
        let direct: Vec<Condition> = node
            .capabilities
            .condition
            .as_ref()
            .and_then(|c| c.active())
            .map(|set| {
                set.conditions
                    .iter()
                    .filter(|c| c.direction == ConditionDirection::Direct)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let inverse = self.inverse_conditions_for(&node.id);
        evaluate_visibility(&direct, &inverse, state)
    }

    /// Conditions declared on other nodes that target this field
    fn inverse_conditions_for(&self, field_id: &str) -> Vec<Condition> {
        self.graph
            .nodes
            .iter()
            .filter(|n| n.id != field_id)
            .filter_map(|n| n.capabilities.condition.as_ref())
            .filter(|c| c.enabled)
            .flat_map(|c| c.instances.values())
            .flat_map(|set| set.conditions.iter())
            .filter(|c| {
                c.direction == ConditionDirection::Inverse
                    && c.target_node_id.as_deref() == Some(field_id)
            })
            .cloned()
            .collect()
    }
}
