/// Progress of a run as last reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    /// Navigation target of the step in flight; `None` once the run is done.
    pub target: Option<String>,
    pub eta_ms: u64,
    pub countdown: u32,
    pub is_final: bool,
}

impl Progress {
    /// Progress for the entry at `position` (0-based) whose navigation was just armed.
    pub fn armed(
        position: usize,
        total: usize,
        target: String,
        step_delay_ms: u64,
        countdown: u32,
    ) -> Self {
        let remaining = total.saturating_sub(position + 1);
        Self {
            completed: position,
            total,
            percent: percent_complete(position, total, false),
            target: Some(target),
            eta_ms: estimate_remaining_ms(remaining, step_delay_ms),
            countdown,
            is_final: remaining == 0,
        }
    }

    pub fn finished(total: usize) -> Self {
        Self {
            completed: total,
            total,
            percent: percent_complete(total, total, true),
            target: None,
            eta_ms: 0,
            countdown: 0,
            is_final: false,
        }
    }

    /// Advances the countdown by one second; the completed count never moves here.
    pub(crate) fn tick(&mut self) {
        self.countdown = self.countdown.saturating_sub(1);
        self.eta_ms = self.eta_ms.saturating_sub(1000);
    }
}

/// Rounded completion percentage.
///
/// Stays at 99 or below until the run is `finished`, even when rounding
/// would already produce 100.
pub fn percent_complete(completed: usize, total: usize, finished: bool) -> u8 {
    if total == 0 {
        return if finished { 100 } else { 0 };
    }
    let done = completed.min(total);
    let pct = ((done as f64 / total as f64) * 100.0).round() as u8;
    if finished {
        pct
    } else {
        pct.min(99)
    }
}

pub fn estimate_remaining_ms(remaining: usize, step_delay_ms: u64) -> u64 {
    remaining as u64 * step_delay_ms
}

/// Formats a duration as `"Xm YYs"` from one minute upwards, `"Ys"` below.
pub fn format_duration(ms: u64) -> String {
    let secs = (ms as f64 / 1000.0).round() as u64;
    let minutes = secs / 60;
    let rest = secs % 60;
    if minutes > 0 {
        format!("{minutes}m {rest:02}s")
    } else {
        format!("{rest}s")
    }
}
