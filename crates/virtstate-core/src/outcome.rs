//! Reconciliation outcome: whether anything changed, and why.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why a reconciliation reported a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeReason {
    /// A new VM definition was registered
    #[serde(rename = "created")]
    Created,
    /// An existing definition was overridden with different content
    #[serde(rename = "config changed")]
    ConfigChanged,
    /// The host-autostart flag was toggled
    #[serde(rename = "autostart")]
    Autostart,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeReason::Created => f.write_str("created"),
            ChangeReason::ConfigChanged => f.write_str("config changed"),
            ChangeReason::Autostart => f.write_str("autostart"),
        }
    }
}

/// Result of one reconciliation run.
///
/// `changed == false` guarantees no mutating driver call was issued.
/// Within a run `changed` only ever moves from false to true. Command
/// results land in `detail` under a key equal to the command token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether this run mutated anything on the hypervisor
    pub changed: bool,
    /// Reason for the change, when one specific cause applies
    #[serde(rename = "change_reason", skip_serializing_if = "Option::is_none")]
    pub reason: Option<ChangeReason>,
    /// Command payload, keyed by command token
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

impl Outcome {
    /// An unchanged outcome with no payload.
    pub fn unchanged() -> Self {
        Self::default()
    }

    /// Record a change. A `None` reason leaves any earlier reason in place.
    pub(crate) fn mark_changed(&mut self, reason: Option<ChangeReason>) {
        self.changed = true;
        if reason.is_some() {
            self.reason = reason;
        }
    }

    /// Attach a payload value under the given key.
    pub(crate) fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.detail.insert(key.to_string(), value);
        self
    }

    /// The payload stored under the given key, if any.
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.detail.get(key)
    }
}
