//! Runner core: pure navigation state machine and view-model helpers.
mod effect;
mod ingest;
mod keys;
mod msg;
mod progress;
mod settings;
mod state;
mod target;
mod update;
mod view_model;

pub use effect::Effect;
pub use ingest::{ingest_csv, IngestOptions, IngestReport};
pub use keys::{decode_run_state, StorageKey, KEY_PREFIX};
pub use msg::Msg;
pub use progress::{estimate_remaining_ms, format_duration, percent_complete, Progress};
pub use settings::{SettingsView, ToggleOutcome};
pub use state::{
    ControllerConfig, PendingNavigation, Phase, RunState, Timing, WindowPosition,
    DEFAULT_DEBUG_PARAM, DEFAULT_STEP_DELAY_MS,
};
pub use target::{build_target, normalize_url, token_from_address, TargetError};
pub use update::update;
pub use view_model::{ControlsView, ProgressView, RunnerView, UploadHint};
