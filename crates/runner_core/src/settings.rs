use serde_json::{Map, Value};

use crate::keys::StorageKey;
use crate::Phase;

/// State of the on/off settings surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsView {
    pub enabled: bool,
    /// The toggle cannot be flipped while a run is navigating.
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Locked or already in the requested position.
    Refused,
    Disabled,
    /// Enabled; the current page should be reloaded so a session can start.
    EnabledReloadRequested,
}

impl SettingsView {
    pub fn from_stored(stored: &Map<String, Value>) -> Self {
        let enabled = stored
            .get(StorageKey::Enabled.as_str())
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let phase = stored
            .get(StorageKey::Phase.as_str())
            .and_then(Value::as_str)
            .and_then(Phase::parse)
            .unwrap_or_default();
        Self {
            enabled,
            locked: phase == Phase::Running,
        }
    }

    pub fn status(&self) -> &'static str {
        if self.enabled {
            "Runner is enabled"
        } else {
            "Runner is disabled"
        }
    }

    pub fn toggle(&self, on: bool) -> ToggleOutcome {
        if self.locked || self.enabled == on {
            ToggleOutcome::Refused
        } else if on {
            ToggleOutcome::EnabledReloadRequested
        } else {
            ToggleOutcome::Disabled
        }
    }
}
