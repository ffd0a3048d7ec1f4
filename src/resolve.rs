//! Reference resolver: symbolic tokens to concrete values
//!
//! Formula, condition and lookup configs reference other fields through
//! a small token grammar:
//!
//! ```text
//! @literal.<value>       literal string, prefix stripped
//! @value.<id>            FormState lookup
//! @select.<id>           FormState lookup
//! @table.<id>            FormState lookup
//! @calculated.<id>       FormState, then __mirror_formula_<id>
//! @calculated:<id>       same, alternate separator
//! node-formula:<id>      strip prefix, look up remainder
//! formula:<id>           strip prefix, look up remainder
//! @column.<name>         table column of the option under evaluation
//! <anything else>        FormState key if present, else literal
//! ```
//!
//! Resolution is a pure function and never fails: an unresolvable token
//! degrades to its literal text.

use crate::state::{mirror_formula_key, FormState};
use crate::value::Value;

/// A parsed reference token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefToken<'a> {
    /// `@literal.`: always a literal
    Literal(&'a str),
    /// `@value.` / `@select.` / `@table.`: plain FormState lookup
    Field(&'a str),
    /// `@calculated.` / `@calculated:`: FormState with mirror fallback
    Calculated(&'a str),
    /// `node-formula:` / `formula:`: FormState lookup by formula id
    Formula(&'a str),
    /// `@column.`: resolved by the lookup engine per option
    Column(&'a str),
    /// No recognized prefix
    Bare(&'a str),
}

/// Parse a raw token, checking prefixes in precedence order
pub fn parse_token(raw: &str) -> RefToken<'_> {
    if let Some(rest) = raw.strip_prefix("@literal.") {
        return RefToken::Literal(rest);
    }
    for prefix in ["@value.", "@select.", "@table."] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return RefToken::Field(rest);
        }
    }
    for prefix in ["@calculated.", "@calculated:"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return RefToken::Calculated(rest);
        }
    }
    for prefix in ["node-formula:", "formula:"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return RefToken::Formula(rest);
        }
    }
    if let Some(rest) = raw.strip_prefix("@column.") {
        return RefToken::Column(rest);
    }
    RefToken::Bare(raw)
}

/// Extract the referenced node id from a token, if it names one.
///
/// Used by the constraint extractor to find the field a constraint
/// formula depends on.
pub fn referenced_node_id(raw: &str) -> Option<&str> {
    match parse_token(raw) {
        RefToken::Field(id) | RefToken::Calculated(id) | RefToken::Formula(id) => Some(id),
        _ => None,
    }
}

/// Resolve a token against the current FormState.
///
/// `@column.` tokens have no meaning without an option context; they
/// fall through to the literal default here and are intercepted by the
/// lookup engine before resolution.
pub fn resolve_reference(raw: &str, state: &FormState) -> Value {
    match parse_token(raw) {
        RefToken::Literal(text) => Value::Text(text.to_string()),
        RefToken::Field(id) => lookup_or_literal(id, state),
        RefToken::Calculated(id) => match state.get(id).filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            // Degrade to the stripped id, never the mirror key, so
            // callers can detect an unresolved reference.
            None => match state.get(&mirror_formula_key(id)) {
                Some(v) => v.clone(),
                None => Value::Text(id.to_string()),
            },
        },
        RefToken::Formula(id) => lookup_or_literal(id, state),
        RefToken::Column(name) => Value::Text(name.to_string()),
        RefToken::Bare(text) => lookup_or_literal(text, state),
    }
}

/// FormState value when the key exists, the key itself as text otherwise
fn lookup_or_literal(key: &str, state: &FormState) -> Value {
    match state.get(key) {
        Some(v) => v.clone(),
        None => Value::Text(key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state() -> FormState {
        let mut s = FormState::new();
        s.set_local("power", Value::Number(9100.0));
        s.set_local("model", Value::from("ModelX"));
        s.set_local(mirror_formula_key("total"), Value::Number(42.0));
        s
    }

    #[test]
    fn test_literal_prefix_always_wins() {
        let s = state();
        assert_eq!(
            resolve_reference("@literal.power", &s),
            Value::Text("power".into())
        );
    }

    #[test]
    fn test_value_and_select_prefixes() {
        let s = state();
        assert_eq!(resolve_reference("@value.power", &s), Value::Number(9100.0));
        assert_eq!(
            resolve_reference("@select.model", &s),
            Value::Text("ModelX".into())
        );
    }

    #[test]
    fn test_calculated_falls_back_to_mirror_key() {
        let s = state();
        assert_eq!(
            resolve_reference("@calculated.total", &s),
            Value::Number(42.0)
        );
        assert_eq!(
            resolve_reference("@calculated:total", &s),
            Value::Number(42.0)
        );
    }

    #[test]
    fn test_unresolved_calculated_degrades_to_stripped_id() {
        let s = FormState::new();
        assert_eq!(
            resolve_reference("@calculated.total", &s),
            Value::Text("total".into())
        );
    }

    #[test]
    fn test_formula_prefixes_strip_and_look_up() {
        let mut s = state();
        s.set_local("f1", Value::Number(7.0));
        assert_eq!(resolve_reference("node-formula:f1", &s), Value::Number(7.0));
        assert_eq!(resolve_reference("formula:f1", &s), Value::Number(7.0));
    }

    #[test]
    fn test_bare_token_prefers_state_key() {
        let s = state();
        assert_eq!(resolve_reference("power", &s), Value::Number(9100.0));
        assert_eq!(
            resolve_reference("just a label", &s),
            Value::Text("just a label".into())
        );
    }

    #[test]
    fn test_referenced_node_id() {
        assert_eq!(referenced_node_id("@value.abc"), Some("abc"));
        assert_eq!(referenced_node_id("@calculated:xyz"), Some("xyz"));
        assert_eq!(referenced_node_id("@literal.abc"), None);
        assert_eq!(referenced_node_id("12.5"), None);
    }
}
