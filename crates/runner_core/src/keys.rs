//! Persisted key names and the codec between `RunState` and stored values.
use serde_json::{json, Map, Value};

use crate::state::{ControllerConfig, Phase, RunState, WindowPosition};

pub const KEY_PREFIX: &str = "nav_runner_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    Enabled,
    Index,
    Phase,
    DebugToken,
    Urls,
    Filename,
    Position,
    UploadInvalid,
    StartedAt,
    LastStepAt,
    AverageStepMs,
}

impl StorageKey {
    /// Every key owned by a run. `Enabled` outlives runs and is not listed.
    pub const RUN_KEYS: [StorageKey; 10] = [
        StorageKey::Index,
        StorageKey::Phase,
        StorageKey::DebugToken,
        StorageKey::Urls,
        StorageKey::Filename,
        StorageKey::Position,
        StorageKey::UploadInvalid,
        StorageKey::StartedAt,
        StorageKey::LastStepAt,
        StorageKey::AverageStepMs,
    ];

    pub const TIMING_KEYS: [StorageKey; 3] = [
        StorageKey::StartedAt,
        StorageKey::LastStepAt,
        StorageKey::AverageStepMs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Enabled => "nav_runner_enabled",
            StorageKey::Index => "nav_runner_index",
            StorageKey::Phase => "nav_runner_phase",
            StorageKey::DebugToken => "nav_runner_debug_token",
            StorageKey::Urls => "nav_runner_urls",
            StorageKey::Filename => "nav_runner_filename",
            StorageKey::Position => "nav_runner_position",
            StorageKey::UploadInvalid => "nav_runner_upload_invalid",
            StorageKey::StartedAt => "nav_runner_started_at",
            StorageKey::LastStepAt => "nav_runner_last_step_at",
            StorageKey::AverageStepMs => "nav_runner_average_step_ms",
        }
    }

    pub fn run_key_names() -> Vec<&'static str> {
        Self::RUN_KEYS.iter().map(|key| key.as_str()).collect()
    }
}

impl RunState {
    /// Current value of `key` in its stored representation. Absent optional
    /// fields encode as `null`.
    pub fn persisted_value(&self, key: StorageKey) -> Value {
        let timing = self.timing();
        match key {
            StorageKey::Enabled => json!(self.enabled()),
            StorageKey::Index => json!(self.index()),
            StorageKey::Phase => json!(self.phase().as_str()),
            StorageKey::DebugToken => self.debug_token().map_or(Value::Null, |t| json!(t)),
            StorageKey::Urls => json!(self.urls()),
            StorageKey::Filename => json!(self.filename()),
            StorageKey::Position => self
                .window_position()
                .and_then(|pos| serde_json::to_value(pos).ok())
                .unwrap_or(Value::Null),
            StorageKey::UploadInvalid => json!(self.upload_invalid()),
            StorageKey::StartedAt => timing.started_at.map_or(Value::Null, |v| json!(v)),
            StorageKey::LastStepAt => timing.last_step_at.map_or(Value::Null, |v| json!(v)),
            StorageKey::AverageStepMs => timing.average_step_ms.map_or(Value::Null, |v| json!(v)),
        }
    }

    pub fn persisted_entries(&self, keys: &[StorageKey]) -> Vec<(StorageKey, Value)> {
        keys.iter()
            .map(|&key| (key, self.persisted_value(key)))
            .collect()
    }
}

/// Rebuilds a `RunState` from stored values.
///
/// Every key is optional; absent or wrongly typed values fall back to their
/// defaults, so a damaged store never prevents a session from starting.
pub fn decode_run_state(stored: &Map<String, Value>, config: ControllerConfig) -> RunState {
    let mut state = RunState::with_config(config);
    let get = |key: StorageKey| stored.get(key.as_str()).filter(|v| !v.is_null());

    if let Some(enabled) = get(StorageKey::Enabled).and_then(Value::as_bool) {
        state.set_enabled(enabled);
    }
    if let Some(urls) = get(StorageKey::Urls).and_then(decode_urls) {
        state.set_urls(urls);
    }
    if let Some(index) = get(StorageKey::Index).and_then(decode_u64) {
        let index = usize::try_from(index).unwrap_or(usize::MAX);
        state.set_index(index.min(state.urls().len()));
    }
    if let Some(phase) = get(StorageKey::Phase)
        .and_then(Value::as_str)
        .and_then(Phase::parse)
    {
        state.set_phase(phase);
    }
    state.set_debug_token(
        get(StorageKey::DebugToken)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned),
    );
    if let Some(name) = get(StorageKey::Filename).and_then(Value::as_str) {
        state.set_filename(name.to_string());
    }
    state.set_window_position(get(StorageKey::Position).and_then(decode_position));
    if let Some(invalid) = get(StorageKey::UploadInvalid).and_then(decode_bool) {
        state.set_upload_invalid(invalid);
    }

    let timing = state.timing_mut();
    timing.started_at = get(StorageKey::StartedAt).and_then(decode_u64);
    timing.last_step_at = get(StorageKey::LastStepAt).and_then(decode_u64);
    timing.average_step_ms = get(StorageKey::AverageStepMs).and_then(decode_u64);

    state.consume_dirty();
    state
}

fn decode_urls(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect(),
    )
}

// Older writers stored numbers and flags as strings.
fn decode_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode_position(value: &Value) -> Option<WindowPosition> {
    let position: WindowPosition = serde_json::from_value(value.clone()).ok()?;
    (position.x.is_finite() && position.y.is_finite()).then_some(position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(entries: Value) -> Map<String, Value> {
        entries.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let map = stored(json!({
            "nav_runner_index": "oops",
            "nav_runner_phase": "sideways",
            "nav_runner_position": {"x": "left"},
            "nav_runner_urls": "not-a-list",
        }));
        let state = decode_run_state(&map, ControllerConfig::default());
        assert_eq!(state.index(), 0);
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.window_position(), None);
        assert!(state.urls().is_empty());
    }

    #[test]
    fn string_encoded_numbers_are_accepted() {
        let map = stored(json!({
            "nav_runner_urls": ["https://a.com", "https://b.com"],
            "nav_runner_index": "1",
            "nav_runner_upload_invalid": "false",
        }));
        let state = decode_run_state(&map, ControllerConfig::default());
        assert_eq!(state.index(), 1);
        assert!(!state.upload_invalid());
    }

    #[test]
    fn stale_index_is_capped_at_list_length() {
        let map = stored(json!({
            "nav_runner_urls": ["https://a.com"],
            "nav_runner_index": 9,
        }));
        let state = decode_run_state(&map, ControllerConfig::default());
        assert_eq!(state.index(), 1);
    }

    #[test]
    fn run_keys_share_the_prefix_and_skip_the_toggle() {
        let names = StorageKey::run_key_names();
        assert_eq!(names.len(), 10);
        assert!(names.iter().all(|name| name.starts_with(KEY_PREFIX)));
        assert!(!names.contains(&StorageKey::Enabled.as_str()));
        assert!(StorageKey::Enabled.as_str().starts_with(KEY_PREFIX));
    }
}
