//! FormState, the live value store for one open form session
//!
//! A flat map from node id (or derived key) to current value. The host
//! UI owns all writes except the single corrective write issued by the
//! auto-selection controller.
//!
//! Local edits are stamped with a monotonically increasing version; an
//! incoming external value (a server recompute echoing back) is applied
//! only when it is newer than the last local edit of that key. Keys the
//! user explicitly cleared are never re-populated by injected
//! calculated values.

use crate::value::Value;
use std::collections::{HashMap, HashSet};

/// Derived aggregate key mirroring a formula node's computed value
pub fn mirror_formula_key(node_id: &str) -> String {
    format!("__mirror_formula_{node_id}")
}

/// Live form values, one session
#[derive(Debug, Clone, Default)]
pub struct FormState {
    values: HashMap<String, Value>,
    /// Version of the last local edit per key
    local_versions: HashMap<String, u64>,
    /// Keys the user explicitly emptied
    cleared: HashSet<String>,
    clock: u64,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw host JSON, unwrapping `{ value: ... }` objects
    pub fn from_json_map(raw: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut state = Self::new();
        for (key, value) in raw {
            state.values.insert(key.clone(), Value::from_json(value));
        }
        state
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// A key is present only when it holds a non-absent value
    pub fn contains(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Version stamp of the most recent local edit, if any
    pub fn local_version(&self, key: &str) -> Option<u64> {
        self.local_versions.get(key).copied()
    }

    /// Record a user edit. Clearing a value marks the key as
    /// deliberately emptied so later injections leave it alone.
    pub fn set_local(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.clock += 1;
        self.local_versions.insert(key.clone(), self.clock);
        if value.is_empty() {
            self.cleared.insert(key.clone());
        } else {
            self.cleared.remove(&key);
        }
        self.values.insert(key, value);
    }

    /// Apply an externally computed value stamped with the version of
    /// the state it was computed from. Stale echoes are dropped.
    pub fn apply_external(&mut self, key: impl Into<String>, value: Value, version: u64) -> bool {
        let key = key.into();
        if let Some(local) = self.local_versions.get(&key) {
            if *local > version {
                tracing::debug!(key = %key, local = local, external = version,
                    "dropping stale external value");
                return false;
            }
        }
        self.values.insert(key, value);
        true
    }

    /// Current version clock, used to stamp outgoing recomputes
    pub fn version(&self) -> u64 {
        self.clock
    }

    /// Whether the user deliberately emptied this key
    pub fn is_cleared(&self, key: &str) -> bool {
        self.cleared.contains(key)
    }

    /// Fill gaps with backend-calculated values before a lookup pass.
    ///
    /// Never overrides a non-empty user value and never touches a key
    /// the user explicitly cleared.
    pub fn inject_calculated<I>(&mut self, calculated: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in calculated {
            if value.is_empty() || self.cleared.contains(&key) {
                continue;
            }
            let existing_empty = self.values.get(&key).is_none_or(Value::is_empty);
            if existing_empty {
                self.values.insert(key, value);
            }
        }
    }
}
