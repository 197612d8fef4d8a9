use serde::{Deserialize, Serialize};

use crate::ingest::IngestOptions;
use crate::progress::Progress;
use crate::view_model::{ControlsView, ProgressView, RunnerView, UploadHint};

/// Fixed delay between arming a navigation and performing it.
pub const DEFAULT_STEP_DELAY_MS: u64 = 5_000;
/// Query parameter that carries the debug token.
pub const DEFAULT_DEBUG_PARAM: &str = "gtm_debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Upload,
    Running,
    Paused,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Upload => "upload",
            Phase::Running => "running",
            Phase::Paused => "paused",
            Phase::Done => "done",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idle" => Some(Phase::Idle),
            "upload" => Some(Phase::Upload),
            "running" => Some(Phase::Running),
            "paused" => Some(Phase::Paused),
            "done" => Some(Phase::Done),
            _ => None,
        }
    }
}

/// Wall-clock statistics over observed steps, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timing {
    pub started_at: Option<u64>,
    pub last_step_at: Option<u64>,
    pub average_step_ms: Option<u64>,
}

impl Timing {
    /// Folds a step observed at `now` into the statistics.
    ///
    /// The average is an exponential moving average weighting the newest
    /// sample by 0.25; the first sample seeds it directly.
    pub fn record(&mut self, now: u64) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if let Some(last) = self.last_step_at {
            let sample = now.saturating_sub(last);
            let next = match self.average_step_ms {
                Some(avg) if avg > 0 => (avg as f64 * 0.75 + sample as f64 * 0.25).round() as u64,
                _ => sample,
            };
            self.average_step_ms = Some(next);
        }
        self.last_step_at = Some(now);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowPosition {
    pub x: f64,
    pub y: f64,
}

/// Navigation armed by the last step, waiting for its delay to elapse.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingNavigation {
    pub target: String,
    pub seconds_left: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub step_delay_ms: u64,
    pub debug_param: String,
    pub ingest: IngestOptions,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: DEFAULT_STEP_DELAY_MS,
            debug_param: DEFAULT_DEBUG_PARAM.to_string(),
            ingest: IngestOptions::default(),
        }
    }
}

impl ControllerConfig {
    pub fn countdown_seconds(&self) -> u32 {
        self.step_delay_ms.div_ceil(1000) as u32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    config: ControllerConfig,
    urls: Vec<String>,
    index: usize,
    phase: Phase,
    debug_token: Option<String>,
    filename: String,
    timing: Timing,
    window_position: Option<WindowPosition>,
    upload_invalid: bool,
    enabled: bool,
    // Page-lifetime only; never written to the store.
    trigger_token: Option<String>,
    active: bool,
    pending: Option<PendingNavigation>,
    progress: Option<Progress>,
    dirty: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self::with_config(ControllerConfig::default())
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        Self {
            config,
            urls: Vec::new(),
            index: 0,
            phase: Phase::Idle,
            debug_token: None,
            filename: String::new(),
            timing: Timing::default(),
            window_position: None,
            upload_invalid: false,
            enabled: true,
            trigger_token: None,
            active: false,
            pending: None,
            progress: None,
            dirty: false,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn debug_token(&self) -> Option<&str> {
        self.debug_token.as_deref()
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn window_position(&self) -> Option<WindowPosition> {
        self.window_position
    }

    pub fn upload_invalid(&self) -> bool {
        self.upload_invalid
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending(&self) -> Option<&PendingNavigation> {
        self.pending.as_ref()
    }

    pub fn progress(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    /// Returns whether a render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn view(&self) -> RunnerView {
        let has_list = !self.urls.is_empty();
        let hint = if has_list {
            UploadHint::Found(self.urls.len())
        } else if self.upload_invalid {
            UploadHint::Invalid
        } else {
            UploadHint::None
        };
        RunnerView {
            phase: self.phase,
            url_count: self.urls.len(),
            filename: (!self.filename.is_empty()).then(|| self.filename.clone()),
            hint,
            intro: intro_text(self.phase),
            controls: ControlsView::for_phase(self.phase, has_list),
            progress: self
                .progress
                .as_ref()
                .map(|progress| ProgressView::from_progress(progress, self.phase)),
            position: self.window_position,
        }
    }

    // Mutators used by `update` and the persisted-state decoder.

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.dirty = true;
        }
    }

    pub(crate) fn set_urls(&mut self, urls: Vec<String>) {
        self.urls = urls;
        self.index = 0;
        self.dirty = true;
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn advance_index(&mut self) -> usize {
        let position = self.index;
        self.index += 1;
        position
    }

    pub(crate) fn set_debug_token(&mut self, token: Option<String>) {
        self.debug_token = token;
    }

    pub(crate) fn set_filename(&mut self, filename: String) {
        self.filename = filename;
        self.dirty = true;
    }

    pub(crate) fn timing_mut(&mut self) -> &mut Timing {
        &mut self.timing
    }

    pub(crate) fn set_window_position(&mut self, position: Option<WindowPosition>) {
        self.window_position = position;
    }

    pub(crate) fn set_upload_invalid(&mut self, invalid: bool) {
        self.upload_invalid = invalid;
        self.dirty = true;
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn trigger_token(&self) -> Option<&str> {
        self.trigger_token.as_deref()
    }

    pub(crate) fn activate(&mut self, token: String) {
        self.trigger_token = Some(token);
        self.active = true;
        self.dirty = true;
    }

    pub(crate) fn set_pending(&mut self, pending: Option<PendingNavigation>) {
        self.pending = pending;
    }

    pub(crate) fn pending_mut(&mut self) -> Option<&mut PendingNavigation> {
        self.pending.as_mut()
    }

    pub(crate) fn set_progress(&mut self, progress: Option<Progress>) {
        self.progress = progress;
        self.dirty = true;
    }

    pub(crate) fn progress_mut(&mut self) -> Option<&mut Progress> {
        self.progress.as_mut()
    }

    /// Drops every run field and deactivates, keeping config and the toggle.
    pub(crate) fn reset(&mut self) {
        let config = std::mem::take(&mut self.config);
        let enabled = self.enabled;
        *self = Self::with_config(config);
        self.enabled = enabled;
        self.dirty = true;
    }
}

fn intro_text(phase: Phase) -> &'static str {
    match phase {
        Phase::Running => {
            "The run has started. Depending on the number of URLs and page load times this can take a while."
        }
        Phase::Paused => "The run is paused. Press \"resume\" to continue.",
        Phase::Done => {
            "The run completed. Check the current tag coverage in your tag manager account and repeat the run if needed."
        }
        Phase::Idle | Phase::Upload => {
            "Upload a tag coverage CSV export. URLs that are not tagged are filtered out automatically."
        }
    }
}
