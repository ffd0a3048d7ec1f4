//! Dynamic constraints fed by constraint formulas
//!
//! A formula instance with a `target_property` does not produce the
//! field's value; it feeds one property of the field (a numeric bound,
//! a step, or a boolean flag) from another node's live value. The field
//! stays editable, and a violated bound surfaces an advisory message
//! rather than an error.

use crate::engine::CalculatedValueProvider;
use crate::node::{Node, NodeGraph, TargetProperty};
use crate::precedence::computed_value;
use crate::resolve::{referenced_node_id, resolve_reference};
use crate::state::{mirror_formula_key, FormState};
use crate::value::Value;

/// Bounds and flags extracted from a node's constraint formulas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    pub number_max: Option<f64>,
    pub number_min: Option<f64>,
    pub step: Option<f64>,
    pub visible: Option<bool>,
    pub required: Option<bool>,
    pub disabled: Option<bool>,
    /// Message template attached to the max bound
    pub max_message: Option<String>,
    /// Message template attached to the min bound
    pub min_message: Option<String>,
}

impl ConstraintSet {
    pub fn is_empty(&self) -> bool {
        self == &ConstraintSet::default()
    }

    /// Advisory for a value that violates a numeric bound.
    ///
    /// Only rendered on violation; a value inside the bounds yields
    /// nothing even when a message template exists.
    pub fn violation_message(&self, current: &Value) -> Option<String> {
        let n = current.as_number()?;
        if let Some(max) = self.number_max {
            if n > max {
                let template = self.max_message.as_deref().unwrap_or("{value} > {max}");
                return Some(self.render(template, current));
            }
        }
        if let Some(min) = self.number_min {
            if n < min {
                let template = self.min_message.as_deref().unwrap_or("{value} < {min}");
                return Some(self.render(template, current));
            }
        }
        None
    }

    fn render(&self, template: &str, current: &Value) -> String {
        let bound_text = |b: Option<f64>| b.map(|n| Value::Number(n).as_text()).unwrap_or_default();
        template
            .replace("{max}", &bound_text(self.number_max))
            .replace("{min}", &bound_text(self.number_min))
            .replace("{value}", &current.as_text())
    }
}

/// Extract the constraint set for one node.
///
/// Every instance of the formula capability with a `target_property`
/// contributes, in instance order; later instances overwrite earlier
/// ones targeting the same property.
pub fn extract_constraints(
    node: &Node,
    graph: &NodeGraph,
    state: &FormState,
    calculated: &dyn CalculatedValueProvider,
) -> ConstraintSet {
    let mut set = ConstraintSet::default();
    let Some(capability) = node.capabilities.formula.as_ref().filter(|c| c.enabled) else {
        return set;
    };

    for instance in capability.instances.values() {
        let Some(target) = instance.target_property else {
            continue;
        };
        let Some(value) = constraint_source(&instance.tokens, graph, state, calculated) else {
            continue;
        };
        match target {
            TargetProperty::NumberMax => {
                set.number_max = value.as_number();
                set.max_message = instance.constraint_message.clone();
            }
            TargetProperty::NumberMin => {
                set.number_min = value.as_number();
                set.min_message = instance.constraint_message.clone();
            }
            TargetProperty::Step => set.step = value.as_number(),
            TargetProperty::Visible => set.visible = Some(value.is_truthy()),
            TargetProperty::Required => set.required = Some(value.is_truthy()),
            TargetProperty::Disabled => set.disabled = Some(value.is_truthy()),
        }
    }

    set
}

/// The first token that yields a non-empty value feeds the constraint.
fn constraint_source(
    tokens: &[String],
    graph: &NodeGraph,
    state: &FormState,
    calculated: &dyn CalculatedValueProvider,
) -> Option<Value> {
    for token in tokens {
        let value = match referenced_node_id(token) {
            Some(id) => match graph.get(id) {
                Some(source) => computed_value(source, state, calculated).unwrap_or_default(),
                // Referenced node outside the loaded graph: the state
                // and its mirror key are still worth a try.
                None => state
                    .get(id)
                    .or_else(|| state.get(&mirror_formula_key(id)))
                    .cloned()
                    .unwrap_or_default(),
            },
            None => resolve_reference(token, state),
        };
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoProviders;
    use crate::node::{Capabilities, Capability, FormulaInstance};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn constraint_node(target: TargetProperty, token: &str, message: Option<&str>) -> Node {
        let mut instances = BTreeMap::new();
        instances.insert(
            "inst-1".to_string(),
            FormulaInstance {
                tokens: vec![token.to_string()],
                target_property: Some(target),
                allow_manual_override: false,
                constraint_message: message.map(String::from),
            },
        );
        Node {
            id: "power".into(),
            capabilities: Capabilities {
                formula: Some(Capability {
                    enabled: true,
                    active_id: None,
                    instances,
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn graph_with(node: Node) -> NodeGraph {
        let mut graph = NodeGraph::default();
        graph.nodes.push(node);
        graph
    }

    #[test]
    fn test_max_bound_follows_referenced_field() {
        let node = constraint_node(TargetProperty::NumberMax, "@value.budget", None);
        let mut state = FormState::new();
        state.set_local("budget", Value::Number(50.0));

        let set = extract_constraints(&node, &graph_with(source("budget")), &state, &NoProviders);
        assert_eq!(set.number_max, Some(50.0));
        assert_eq!(set.number_min, None);
    }

    #[test]
    fn test_boolean_target_uses_truthiness() {
        let node = constraint_node(TargetProperty::Required, "@value.mandatory", None);
        let mut state = FormState::new();
        state.set_local("mandatory", Value::Text("yes".into()));

        let set = extract_constraints(&node, &graph_with(source("mandatory")), &state, &NoProviders);
        assert_eq!(set.required, Some(true));
    }

    #[test]
    fn test_disabled_capability_yields_no_constraints() {
        let mut node = constraint_node(TargetProperty::NumberMax, "@value.budget", None);
        node.capabilities.formula.as_mut().unwrap().enabled = false;

        let set = extract_constraints(&node, &NodeGraph::default(), &FormState::new(), &NoProviders);
        assert!(set.is_empty());
    }

    #[test]
    fn test_message_only_on_violation() {
        let node = constraint_node(
            TargetProperty::NumberMax,
            "@value.budget",
            Some("Maximum {max}, vous avez saisi {value}"),
        );
        let mut state = FormState::new();
        state.set_local("budget", Value::Number(50.0));
        let set = extract_constraints(&node, &graph_with(source("budget")), &state, &NoProviders);

        assert_eq!(set.violation_message(&Value::Number(40.0)), None);
        assert_eq!(
            set.violation_message(&Value::Number(60.0)),
            Some("Maximum 50, vous avez saisi 60".to_string())
        );
    }

    #[test]
    fn test_literal_token_feeds_constraint() {
        let node = constraint_node(TargetProperty::Step, "@literal.0.5", None);
        let set = extract_constraints(&node, &NodeGraph::default(), &FormState::new(), &NoProviders);
        assert_eq!(set.step, Some(0.5));
    }

    fn source(id: &str) -> Node {
        Node {
            id: id.into(),
            ..Default::default()
        }
    }
}
