//! Cascade builder for nested option hierarchies
//!
//! Options that map back to option nodes in the graph may themselves
//! carry option children, forming a cascading picker (level 1 narrows
//! level 2, and so on). The builder walks the graph from each root
//! option, guarded against cycles and runaway depth.

use crate::node::{NodeGraph, NodeType, OptionItem};
use std::collections::HashSet;

/// Hard stop for pathological parent chains
const MAX_CASCADE_DEPTH: usize = 20;

/// One level of a cascading option tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeLevel {
    pub value: String,
    pub label: String,
    pub node_id: Option<String>,
    pub children: Vec<CascadeLevel>,
}

impl CascadeLevel {
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }
}

/// Build the cascade tree for a field's options.
///
/// Options without a backing node stay flat (no children). A node id
/// seen twice on the same path ends that path.
pub fn build_cascade(options: &[OptionItem], graph: &NodeGraph) -> Vec<CascadeLevel> {
    options
        .iter()
        .map(|option| {
            let mut visited = HashSet::new();
            let children = match &option.node_id {
                Some(id) => {
                    visited.insert(id.clone());
                    child_levels(id, graph, &mut visited, 1)
                }
                None => Vec::new(),
            };
            CascadeLevel {
                value: option.value.clone(),
                label: option.label.clone(),
                node_id: option.node_id.clone(),
                children,
            }
        })
        .collect()
}

fn child_levels(
    parent_id: &str,
    graph: &NodeGraph,
    visited: &mut HashSet<String>,
    depth: usize,
) -> Vec<CascadeLevel> {
    if depth >= MAX_CASCADE_DEPTH {
        tracing::warn!(parent = parent_id, "cascade depth cap reached");
        return Vec::new();
    }

    graph
        .children_of(parent_id)
        .filter(|child| child.node_type == NodeType::LeafOption)
        .filter_map(|child| {
            if !visited.insert(child.id.clone()) {
                return None;
            }
            let children = child_levels(&child.id, graph, visited, depth + 1);
            visited.remove(&child.id);
            Some(CascadeLevel {
                value: child.label.clone(),
                label: child.label.clone(),
                node_id: Some(child.id.clone()),
                children,
            })
        })
        .collect()
}

/// Terminal node id for a chosen top-level option, when that option
/// has no deeper levels left to walk
pub fn selected_terminal<'a>(levels: &'a [CascadeLevel], chosen: &str) -> Option<&'a str> {
    levels
        .iter()
        .find(|level| level.value == chosen && level.is_terminal())
        .and_then(|level| level.node_id.as_deref())
}

/// Ids of the nodes a fully-resolved selection can land on
pub fn terminal_node_ids(levels: &[CascadeLevel]) -> Vec<String> {
    let mut ids = Vec::new();
    collect_terminals(levels, &mut ids);
    ids
}

fn collect_terminals(levels: &[CascadeLevel], ids: &mut Vec<String>) {
    for level in levels {
        if level.is_terminal() {
            if let Some(id) = &level.node_id {
                ids.push(id.clone());
            }
        } else {
            collect_terminals(&level.children, ids);
        }
    }
}
