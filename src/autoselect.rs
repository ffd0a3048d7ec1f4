//! Auto-selection keeps a lookup SELECT coherent with its options
//!
//! When the option list of a lookup-backed SELECT changes, the stored
//! value may no longer be a valid choice. The controller clears it when
//! no options remain, and otherwise deterministically picks the first
//! option. To avoid oscillation it remembers the last value it wrote
//! and the signature of the option set it reacted to, and goes quiet
//! when neither has changed since the previous pass.

use crate::node::OptionItem;
use crate::value::Value;
use sha2::{Digest, Sha256};

/// What the controller wants done with the field's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    /// Leave the current value alone
    Keep,
    /// Drop a value with no options left to back it
    Clear,
    /// Write the first valid option
    Select(String),
}

/// Per-field auto-selection memory
#[derive(Debug, Clone, Default)]
pub struct AutoSelection {
    /// Last value this controller wrote itself
    last_written: Option<String>,
    /// Signature of the option set the last write reacted to
    last_signature: Option<String>,
}

/// Order-sensitive fingerprint of an option set
pub fn options_signature(options: &[OptionItem]) -> String {
    let mut hasher = Sha256::new();
    for option in options {
        hasher.update(option.value.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

impl AutoSelection {
    /// Decide what to do with `current` given the new option list.
    ///
    /// `external_in_flight` marks a pending backend recompute of the
    /// dataset feeding this field. While one is in flight, a non-empty
    /// value the user entered is never overwritten, since the refreshed
    /// options may legitimately contain it again.
    pub fn reconcile(
        &mut self,
        options: &[OptionItem],
        current: &Value,
        external_in_flight: bool,
    ) -> SelectionAction {
        let signature = options_signature(options);
        let current_text = current.as_text();
        let wrote_it = self.last_written.as_deref() == Some(current_text.as_str());

        if options.is_empty() {
            if current_text.is_empty() {
                return SelectionAction::Keep;
            }
            if external_in_flight && !wrote_it {
                return SelectionAction::Keep;
            }
            self.last_written = None;
            self.last_signature = Some(signature);
            return SelectionAction::Clear;
        }

        if options.iter().any(|o| o.value == current_text) {
            self.last_signature = Some(signature);
            return SelectionAction::Keep;
        }

        let candidate = options[0].value.clone();
        let already_done = self.last_signature.as_deref() == Some(signature.as_str())
            && self.last_written.as_deref() == Some(candidate.as_str());
        if already_done {
            return SelectionAction::Keep;
        }
        if !current_text.is_empty() && external_in_flight && !wrote_it {
            return SelectionAction::Keep;
        }

        self.last_written = Some(candidate.clone());
        self.last_signature = Some(signature);
        SelectionAction::Select(candidate)
    }
}
