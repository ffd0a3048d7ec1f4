//! Node graph data model: the configuration the engine consumes
//!
//! A form is a flat list of nodes with parent/child links. Each node
//! optionally carries capabilities (condition, formula, data, table,
//! api, link, markers). Capability configs are tagged unions decoded
//! and validated once at load time, not probed dynamically during
//! evaluation.
//!
//! ## Example graph
//!
//! ```yaml
//! tree_id: t1
//! nodes:
//!   - id: power
//!     label: "Puissance"
//!     node_type: leaf_field
//!     sub_type: NUMBER
//!   - id: model
//!     label: "Modèle"
//!     node_type: leaf_field
//!     sub_type: SELECT
//!     capabilities:
//!       table:
//!         enabled: true
//!         active_id: t
//!         instances:
//!           t:
//!             table_reference: inverters
//!             lookup:
//!               key_column: "Modèle"
//! ```

use crate::conditions::CompareOp;
use crate::error::{Error, Result};
use crate::table::TableCapability;
use crate::value::Value;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One configurable element of the form tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    /// Unique identifier
    pub id: String,

    /// Human-readable label
    #[serde(default)]
    pub label: String,

    /// Structural type (branch, leaf_field, leaf_option, leaf_repeater)
    #[serde(default)]
    pub node_type: NodeType,

    /// Field interpretation (TEXT, NUMBER, SELECT, CHECKBOX, DATE, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<FieldType>,

    /// Tree position; `None` for roots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Static options for choice fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionItem>,

    /// Attached behaviors
    #[serde(default, skip_serializing_if = "Capabilities::is_empty")]
    pub capabilities: Capabilities,
}

/// Structural node types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Branch,
    #[default]
    LeafField,
    LeafOption,
    LeafRepeater,
}

/// Field interpretation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Text,
    Number,
    Select,
    Checkbox,
    Date,
    Email,
    Tel,
    Textarea,
    Image,
    File,
}

/// A static label/value option; may carry the node id it was built from
/// so the hierarchy builder can detect sub-option children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptionItem {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl OptionItem {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            node_id: None,
            disabled: None,
        }
    }
}

/// Capability map, one optional slot per capability name
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Capabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Capability<ConditionSet>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<Capability<FormulaInstance>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Capability<DataConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Capability<TableCapability>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<Capability<ApiConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Capability<LinkConfig>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<Capability<MarkerSet>>,
}

impl Capabilities {
    pub fn is_empty(&self) -> bool {
        self.condition.is_none()
            && self.formula.is_none()
            && self.data.is_none()
            && self.table.is_none()
            && self.api.is_none()
            && self.link.is_none()
            && self.markers.is_none()
    }
}

/// One capability slot: enabled flag, active instance id, instance map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability<T> {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_id: Option<String>,

    #[serde(default = "BTreeMap::new")]
    pub instances: BTreeMap<String, T>,
}

// Derived JsonSchema trips over the generic instance map, so the
// schema is spelled out by hand.
impl<T: JsonSchema> JsonSchema for Capability<T> {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        format!("Capability_{}", T::schema_name()).into()
    }

    fn schema_id() -> std::borrow::Cow<'static, str> {
        format!("tbl_engine::Capability<{}>", T::schema_id()).into()
    }

    fn json_schema(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "object",
            "properties": {
                "enabled": { "type": "boolean" },
                "active_id": { "type": ["string", "null"] },
                "instances": {
                    "type": "object",
                    "additionalProperties": generator.subschema_for::<T>()
                }
            }
        })
    }
}

impl<T> Capability<T> {
    /// The instance selected by `active_id`, falling back to the first
    /// instance when no id is set. Disabled capabilities have no
    /// active instance.
    pub fn active(&self) -> Option<&T> {
        if !self.enabled {
            return None;
        }
        match &self.active_id {
            Some(id) => self.instances.get(id),
            None => self.instances.values().next(),
        }
    }
}

impl<T> Default for Capability<T> {
    fn default() -> Self {
        Self {
            enabled: false,
            active_id: None,
            instances: BTreeMap::new(),
        }
    }
}

/// A set of show/hide conditions forming one condition instance
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConditionSet {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A single visibility condition
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    /// Node reference the condition reads (id or reference token)
    pub depends_on: String,

    #[serde(default)]
    pub operator: CompareOp,

    /// Right-hand operand
    #[serde(default, skip_serializing_if = "Value::is_empty")]
    pub compare_value: Value,

    #[serde(default)]
    pub action: ConditionAction,

    #[serde(default)]
    pub direction: ConditionDirection,

    /// For inverse conditions: the field this condition targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<String>,
}

/// What a satisfied condition does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionAction {
    #[default]
    Show,
    Hide,
}

/// Where a condition is declared relative to the field it affects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConditionDirection {
    /// Declared on the field itself
    #[default]
    Direct,
    /// Declared on another node, targeting this field
    Inverse,
}

/// One formula instance: ordered tokens, optional constraint target
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FormulaInstance {
    /// Literal values or reference tokens, in evaluation order
    #[serde(default)]
    pub tokens: Vec<String>,

    /// Absent = the formula produces the field's value.
    /// Present = constraint formula; never makes the field read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_property: Option<TargetProperty>,

    /// Let the user type over a computed value
    #[serde(default)]
    pub allow_manual_override: bool,

    /// Advisory shown when the live value violates the bound.
    /// Supports `{min}`, `{max}` and `{value}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_message: Option<String>,
}

/// Properties a constraint formula can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetProperty {
    #[serde(alias = "max")]
    NumberMax,
    #[serde(alias = "min")]
    NumberMin,
    Step,
    Visible,
    Required,
    Disabled,
}

/// The "data" (variable) capability, tagged by source type
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "source_type", rename_all = "lowercase")]
pub enum DataConfig {
    /// Delegates to a tree-sourced formula/condition reference
    Tree { reference: String },
    /// Emits a fixed literal
    Fixed { value: Value },
}

/// The "link" capability, a non-computational passthrough
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LinkConfig {
    /// Field whose value this node mirrors
    pub target_field: String,

    #[serde(default)]
    pub mode: LinkMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Mirror the target's value
    #[default]
    Mirror,
    /// Render the target's value as an image reference
    Image,
}

/// The "api" capability, executed by an external collaborator; only
/// modelled here so configs round-trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ApiConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_field: Option<String>,
}

/// The "markers" capability
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MarkerSet {
    #[serde(default)]
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Marker {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// The full node graph for one tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NodeGraph {
    #[serde(default)]
    pub tree_id: String,

    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl NodeGraph {
    /// Parse a graph from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_norway::from_str(yaml).map_err(|e| Error::GraphParse(e.to_string()))
    }

    /// Parse a graph from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_norway::to_string(self).map_err(|e| Error::GraphParse(e.to_string()))
    }

    /// Get a node by id
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Direct children of a node
    pub fn children_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Node> + 'a {
        let id = id.to_string();
        self.nodes
            .iter()
            .filter(move |n| n.parent_id.as_deref() == Some(id.as_str()))
    }

    /// Validate the graph once at load time.
    ///
    /// Returns human-readable findings rather than failing fast so a
    /// host can surface all of them at once.
    pub fn validate(&self) -> Vec<String> {
        let mut findings = Vec::new();

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id.is_empty() {
                findings.push("Node with empty id".into());
            }
            if !seen.insert(node.id.as_str()) {
                findings.push(format!("Duplicate node id: {}", node.id));
            }
        }

        let ids: HashSet<_> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        for node in &self.nodes {
            if let Some(parent) = &node.parent_id {
                if !ids.contains(parent.as_str()) {
                    findings.push(format!("Node {} has unknown parent: {}", node.id, parent));
                }
            }

            if let Some(cap) = &node.capabilities.condition {
                if cap.enabled && cap.active().is_none() {
                    findings.push(format!(
                        "Node {}: condition capability enabled but no active instance",
                        node.id
                    ));
                }
                for set in cap.instances.values() {
                    for cond in &set.conditions {
                        if cond.direction == ConditionDirection::Inverse
                            && cond.target_node_id.is_none()
                        {
                            findings.push(format!(
                                "Node {}: inverse condition without a target field",
                                node.id
                            ));
                        }
                    }
                }
            }

            if let Some(cap) = &node.capabilities.table {
                for (iid, instance) in &cap.instances {
                    if instance.lookup.key_column.is_none() && instance.lookup.key_row.is_none() {
                        findings.push(format!(
                            "Node {}: table instance {} has neither key_column nor key_row",
                            node.id, iid
                        ));
                    }
                    if let Some(filters) = &instance.lookup.filter_conditions {
                        for cap_rule in &filters.value_caps {
                            if !cap_rule.max_value.is_finite() {
                                findings.push(format!(
                                    "Node {}: value cap {} has non-finite max_value",
                                    node.id, cap_rule.id
                                ));
                            }
                        }
                    }
                }
            }

            if let Some(cap) = &node.capabilities.link {
                for link in cap.instances.values() {
                    if !ids.contains(link.target_field.as_str()) {
                        findings.push(format!(
                            "Node {}: link targets unknown field: {}",
                            node.id, link.target_field
                        ));
                    }
                }
            }
        }

        findings
    }
}
