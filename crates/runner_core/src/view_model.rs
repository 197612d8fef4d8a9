use std::fmt;

use crate::progress::{format_duration, Progress};
use crate::{Phase, WindowPosition};

/// Everything a presentation surface needs; derived from state alone.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerView {
    pub phase: Phase,
    pub url_count: usize,
    pub filename: Option<String>,
    pub hint: UploadHint,
    pub intro: &'static str,
    pub controls: ControlsView,
    pub progress: Option<ProgressView>,
    pub position: Option<WindowPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadHint {
    None,
    Found(usize),
    Invalid,
}

impl fmt::Display for UploadHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadHint::None => Ok(()),
            UploadHint::Found(count) => write!(f, "Found: {count} URLs (not tagged)"),
            UploadHint::Invalid => write!(
                f,
                "The uploaded CSV file is invalid or contains no untagged URLs."
            ),
        }
    }
}

/// Control visibility per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlsView {
    pub upload: bool,
    pub start: bool,
    pub start_enabled: bool,
    pub pause: bool,
    pub resume: bool,
    pub cancel: bool,
    pub restart: bool,
    pub done_close: bool,
}

impl ControlsView {
    pub fn for_phase(phase: Phase, has_list: bool) -> Self {
        let base = Self {
            start_enabled: has_list && phase != Phase::Done,
            ..Self::default()
        };
        match phase {
            Phase::Idle | Phase::Upload => Self {
                upload: true,
                start: true,
                cancel: true,
                ..base
            },
            Phase::Running => Self { pause: true, ..base },
            Phase::Paused => Self {
                resume: true,
                ..base
            },
            Phase::Done => Self {
                restart: true,
                done_close: true,
                ..base
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    pub target_label: String,
    pub eta_label: Option<String>,
    /// Hidden on the final hop and outside the running phase.
    pub countdown: Option<u32>,
    pub is_final: bool,
}

impl ProgressView {
    pub fn from_progress(progress: &Progress, phase: Phase) -> Self {
        let running = phase == Phase::Running;
        Self {
            completed: progress.completed,
            total: progress.total,
            percent: progress.percent,
            target_label: progress
                .target
                .clone()
                .unwrap_or_else(|| "Finished".to_string()),
            eta_label: running.then(|| format_duration(progress.eta_ms)),
            countdown: (running && !progress.is_final).then_some(progress.countdown),
            is_final: progress.is_final,
        }
    }
}
