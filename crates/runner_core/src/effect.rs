use serde_json::Value;

use crate::keys::StorageKey;
use crate::state::RunState;

/// Side effects requested by `update`, executed by the session in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Write the values through to both store tiers.
    Persist(Vec<(StorageKey, Value)>),
    /// Remove the keys from both store tiers.
    Remove(Vec<StorageKey>),
    /// Arm the one-shot navigation and the one-second countdown together.
    ArmNavigation { target: String, delay_ms: u64 },
    /// Cancel the navigation timer and the countdown together.
    CancelTimers,
    /// Perform a full page load of `target`.
    Navigate { target: String },
    /// Remove the presentation surface; the session is over.
    Teardown,
}

impl Effect {
    pub(crate) fn persist(state: &RunState, keys: &[StorageKey]) -> Self {
        Effect::Persist(state.persisted_entries(keys))
    }
}
