//! Engine value type and coercions
//!
//! Form values arrive from the host as loosely-typed JSON: strings,
//! numbers, booleans, arrays, or objects wrapping a `value` property.
//! `Value` normalizes all of that and carries the coercion rules the
//! rest of the engine relies on: empty string, null, and empty list are
//! all "absent"; text that parses as a number compares numerically.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A form value as seen by the engine
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Build from raw host JSON, unwrapping `{ value: ... }` objects.
    ///
    /// Objects without a `value` property carry no usable scalar
    /// (images, file payloads) and collapse to `Null`.
    pub fn from_json(raw: &serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => match map.get("value") {
                Some(inner) => Value::from_json(inner),
                None => Value::Null,
            },
        }
    }

    /// Absent for condition purposes: null, blank text, or empty list
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Numeric view, parsing text when possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => {
                // Tolerate decimal commas from imported datasets
                let normalized = s.trim().replace(',', ".");
                normalized.parse::<f64>().ok()
            }
            _ => None,
        }
    }

    /// Text view used by string comparisons and option values
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::as_text)
                .collect::<Vec<_>>()
                .join(" ; "),
        }
    }

    /// Truthy coercion for boolean constraint targets
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => {
                let t = s.trim().to_ascii_lowercase();
                !t.is_empty() && t != "false" && t != "0" && t != "non" && t != "no"
            }
            Value::List(items) => !items.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

/// Render a number without a trailing `.0` for integral values
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_unwraps_value_objects() {
        let raw = serde_json::json!({ "value": "42", "label": "forty-two" });
        assert_eq!(Value::from_json(&raw), Value::Text("42".into()));

        let nested = serde_json::json!({ "value": { "value": 7 } });
        assert_eq!(Value::from_json(&nested), Value::Number(7.0));
    }

    #[test]
    fn test_object_without_value_is_null() {
        let raw = serde_json::json!({ "thumbnails": [], "original": "data:image/png" });
        assert_eq!(Value::from_json(&raw), Value::Null);
    }

    #[test]
    fn test_is_empty() {
        assert!(Value::Null.is_empty());
        assert!(Value::Text("   ".into()).is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(!Value::Number(0.0).is_empty());
        assert!(!Value::Bool(false).is_empty());
    }

    #[test]
    fn test_as_number_parses_text() {
        assert_eq!(Value::Text("12.5".into()).as_number(), Some(12.5));
        assert_eq!(Value::Text("12,5".into()).as_number(), Some(12.5));
        assert_eq!(Value::Text("abc".into()).as_number(), None);
    }

    #[test]
    fn test_as_text_formats_integral_numbers() {
        assert_eq!(Value::Number(20.0).as_text(), "20");
        assert_eq!(Value::Number(2.5).as_text(), "2.5");
    }
}
