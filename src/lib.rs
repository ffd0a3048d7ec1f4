// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # tbl-engine — Dynamic field evaluation for tree-structured forms
//!
//! A form is a tree of nodes (branches, fields, options, repeaters).
//! Fields carry **capabilities**: conditions that show or hide them,
//! formulas that compute values or bounds, table lookups that derive
//! their option lists from datasets, links that mirror other fields,
//! and fixed or tree-sourced data. This crate evaluates one such tree
//! against the live form state.
//!
//! ## Core Concept
//!
//! Evaluation is a pure function of the node graph, the `FormState`
//! and two provider traits. From those, a pass over a field decides:
//!
//! - **Visibility** from its direct conditions and the inverse
//!   conditions other nodes aim at it
//! - **Governance**: which single source owns its value
//!   (link > data > value-formula > table > input)
//! - **Options** via the table lookup pipeline (filters, multipliers,
//!   column overrides, value caps, alerts)
//! - **Auto-selection**: keep, clear, or pick the only option left
//! - **Constraints** fed by constraint formulas, with advisory
//!   messages on violation
//! - **Cascades**: nested option hierarchies from the graph
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tbl_engine::{Engine, FormState, NodeGraph, NoProviders, SessionContext};
//!
//! let graph = NodeGraph::from_yaml(r#"
//!   tree_id: quote-form
//!   nodes:
//!     - id: power
//!       label: Puissance
//!       node_type: leaf_field
//!       capabilities:
//!         condition:
//!           enabled: true
//!           instances:
//!             c1:
//!               conditions:
//!                 - depends_on: "@value.kind"
//!                   operator: equals
//!                   compare_value: ups
//! "#)?;
//!
//! let mut state = FormState::new();
//! state.set_local("kind", "ups".into());
//!
//! let engine = Engine::new(&graph, &NoProviders, &NoProviders);
//! let mut session = SessionContext::new();
//! let eval = engine.evaluate("power", &state, &mut session).unwrap();
//! assert!(eval.visible);
//! ```
//!
//! ## Evaluation Order
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                                                        │
//! │  NodeGraph + FormState + providers                     │
//! │       │                                                │
//! │       ├──► visibility (direct + inverse conditions)    │
//! │       │                                                │
//! │       ├──► precedence (link > data > formula > table)  │
//! │       │                                                │
//! │       ├──► lookup (options, filters, caps, alerts)     │
//! │       │                                                │
//! │       ├──► cascade + auto-selection                    │
//! │       │                                                │
//! │       └──► constraints (bounds, flags, advisories)     │
//! │                                                        │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Evaluation never fails mid-pass: a missing dataset yields an empty
//! option list, a dangling reference resolves to its literal text or
//! to nothing, and only graph loading returns errors.

// Data model
pub mod error;
pub mod node;
pub mod state;
pub mod table;
pub mod value;

// Evaluation
pub mod autoselect;
pub mod conditions;
pub mod constraints;
pub mod engine;
pub mod hierarchy;
pub mod lookup;
pub mod precedence;
pub mod resolve;

// Re-exports
pub use autoselect::{options_signature, AutoSelection, SelectionAction};
pub use conditions::{compare, evaluate_visibility, predicate_holds, CompareOp};
pub use constraints::{extract_constraints, ConstraintSet};
pub use engine::{
    CalculatedValueProvider, DatasetProvider, Engine, FieldEvaluation, NoProviders,
    SessionContext, StaticDatasets,
};
pub use error::{Error, Result};
pub use hierarchy::{build_cascade, selected_terminal, terminal_node_ids, CascadeLevel};
pub use lookup::{run_lookup, sanitize_direct_options, LookupOutcome};
pub use node::{
    Capabilities, Capability, Condition, ConditionAction, ConditionDirection, ConditionSet,
    DataConfig, FieldType, FormulaInstance, LinkConfig, LinkMode, Node, NodeGraph, NodeType,
    OptionItem, TargetProperty,
};
pub use precedence::{computed_value, resolve_precedence, Governance, GoverningSource};
pub use resolve::{parse_token, referenced_node_id, resolve_reference, RefToken};
pub use state::{mirror_formula_key, FormState};
pub use table::{
    Alert, AlertLevel, CapScope, DatasetKind, FilterConfig, FilterLogic, LookupConfig,
    TableCapability, TableDataset, ValueCap,
};
pub use value::Value;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
