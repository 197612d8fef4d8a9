use runner_logging::{runner_debug, runner_info, runner_warn};

use crate::ingest::ingest_csv;
use crate::keys::StorageKey;
use crate::progress::Progress;
use crate::state::{PendingNavigation, WindowPosition};
use crate::target::build_target;
use crate::{Effect, Msg, Phase, RunState};

/// Pure update function: applies a message to state and returns any effects.
///
/// `now_ms` is the wall-clock time in epoch milliseconds and only feeds the
/// timing statistics. A torn-down state ignores everything but `Activated`.
pub fn update(mut state: RunState, msg: Msg, now_ms: u64) -> (RunState, Vec<Effect>) {
    if !state.is_active() && !matches!(msg, Msg::Activated { .. }) {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Activated { token } => activate(&mut state, token, now_ms),
        Msg::StartClicked => {
            if state.urls().is_empty() {
                state.set_phase(Phase::Upload);
                Vec::new()
            } else if matches!(state.phase(), Phase::Idle | Phase::Upload) {
                state.set_phase(Phase::Running);
                let mut effects = vec![Effect::persist(&state, &[StorageKey::Phase])];
                effects.extend(step(&mut state, now_ms));
                effects
            } else {
                Vec::new()
            }
        }
        Msg::PauseClicked => {
            if state.phase() == Phase::Running {
                state.set_phase(Phase::Paused);
                state.set_pending(None);
                vec![
                    Effect::persist(&state, &[StorageKey::Phase]),
                    Effect::CancelTimers,
                ]
            } else {
                Vec::new()
            }
        }
        Msg::ResumeClicked => {
            if state.phase() == Phase::Paused {
                state.set_phase(Phase::Running);
                let mut effects = vec![Effect::persist(&state, &[StorageKey::Phase])];
                effects.extend(step(&mut state, now_ms));
                effects
            } else {
                Vec::new()
            }
        }
        Msg::RestartClicked => {
            if state.urls().is_empty() {
                state.set_phase(Phase::Upload);
                Vec::new()
            } else {
                state.timing_mut().clear();
                state.set_index(0);
                state.set_pending(None);
                state.set_phase(Phase::Running);
                let mut effects = vec![
                    Effect::CancelTimers,
                    Effect::Remove(StorageKey::TIMING_KEYS.to_vec()),
                    Effect::persist(&state, &[StorageKey::Index, StorageKey::Phase]),
                ];
                effects.extend(step(&mut state, now_ms));
                effects
            }
        }
        Msg::CancelClicked | Msg::CloseClicked => teardown(&mut state),
        Msg::Uploaded { name, text } => {
            let report = ingest_csv(&text, &state.config().ingest);
            runner_info!(
                "Uploaded {:?}: rows={} matched={} unique={} duplicates={}",
                name,
                report.rows_seen,
                report.rows_matched,
                report.urls.len(),
                report.duplicates
            );
            let invalid = report.is_empty();
            let mut effects = stop_for_list_change(&mut state);
            state.set_filename(name);
            state.set_urls(report.urls);
            state.set_upload_invalid(invalid);
            state.set_phase(if invalid { Phase::Upload } else { Phase::Idle });
            effects.push(Effect::persist(
                &state,
                &[
                    StorageKey::Urls,
                    StorageKey::Filename,
                    StorageKey::Index,
                    StorageKey::UploadInvalid,
                    StorageKey::Phase,
                ],
            ));
            effects
        }
        Msg::ListCleared => {
            let mut effects = stop_for_list_change(&mut state);
            state.set_urls(Vec::new());
            state.set_filename(String::new());
            state.set_upload_invalid(false);
            state.set_phase(Phase::Upload);
            effects.push(Effect::persist(
                &state,
                &[
                    StorageKey::Urls,
                    StorageKey::Filename,
                    StorageKey::Index,
                    StorageKey::UploadInvalid,
                    StorageKey::Phase,
                ],
            ));
            effects
        }
        Msg::CountdownTick => {
            if state.phase() == Phase::Running {
                if let Some(pending) = state.pending_mut() {
                    pending.seconds_left = pending.seconds_left.saturating_sub(1);
                    if pending.seconds_left > 0 {
                        if let Some(progress) = state.progress_mut() {
                            progress.tick();
                        }
                        state.mark_dirty();
                    }
                }
            }
            Vec::new()
        }
        Msg::NavigationDue => {
            if state.phase() == Phase::Running {
                match state.pending().cloned() {
                    Some(pending) => {
                        state.set_pending(None);
                        runner_info!("Navigating to {}", pending.target);
                        vec![Effect::Navigate {
                            target: pending.target,
                        }]
                    }
                    None => Vec::new(),
                }
            } else {
                Vec::new()
            }
        }
        Msg::EnabledChanged(enabled) => {
            state.set_enabled(enabled);
            if enabled {
                Vec::new()
            } else {
                runner_info!("Feature disabled externally in phase {:?}", state.phase());
                teardown(&mut state)
            }
        }
        Msg::WindowMoved { x, y } => {
            if x.is_finite() && y.is_finite() {
                state.set_window_position(Some(WindowPosition { x, y }));
                vec![Effect::persist(&state, &[StorageKey::Position])]
            } else {
                Vec::new()
            }
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn activate(state: &mut RunState, token: String, now_ms: u64) -> Vec<Effect> {
    let token = token.trim().to_string();
    if state.is_active() || token.is_empty() || !state.enabled() {
        return Vec::new();
    }
    state.activate(token.clone());
    state.set_debug_token(Some(token));

    if state.urls().is_empty() && state.phase() != Phase::Running {
        state.set_phase(Phase::Upload);
    } else if state.phase() == Phase::Upload {
        state.set_phase(Phase::Idle);
    }
    runner_debug!(
        "Activated in phase {:?} at index {}/{}",
        state.phase(),
        state.index(),
        state.urls().len()
    );

    let mut effects = vec![Effect::persist(
        state,
        &[StorageKey::DebugToken, StorageKey::Phase, StorageKey::Index],
    )];
    if state.phase() == Phase::Running {
        effects.extend(step(state, now_ms));
    }
    effects
}

/// Processes the entry at the current index: records timing, advances and
/// persists the index, then arms the deferred navigation.
fn step(state: &mut RunState, now_ms: u64) -> Vec<Effect> {
    if state.urls().is_empty() {
        state.set_phase(Phase::Upload);
        return vec![Effect::persist(state, &[StorageKey::Phase])];
    }

    state.timing_mut().record(now_ms);
    let mut effects = vec![Effect::persist(state, &StorageKey::TIMING_KEYS)];

    loop {
        let total = state.urls().len();
        if state.index() >= total {
            state.set_pending(None);
            state.set_phase(Phase::Done);
            state.set_progress(Some(Progress::finished(total)));
            runner_info!("Run finished after {} URLs", total);
            effects.push(Effect::persist(state, &[StorageKey::Phase]));
            effects.push(Effect::CancelTimers);
            return effects;
        }

        let token = state
            .debug_token()
            .or_else(|| state.trigger_token())
            .map(ToOwned::to_owned);
        let Some(token) = token else {
            runner_warn!("No debug token available; ending the session");
            effects.extend(teardown(state));
            return effects;
        };
        state.set_debug_token(Some(token.clone()));

        let position = state.advance_index();
        effects.push(Effect::persist(
            state,
            &[StorageKey::DebugToken, StorageKey::Index],
        ));

        let entry = &state.urls()[position];
        match build_target(entry, &state.config().debug_param, &token) {
            Ok(target) => {
                let delay_ms = state.config().step_delay_ms;
                let countdown = state.config().countdown_seconds();
                state.set_progress(Some(Progress::armed(
                    position,
                    total,
                    target.clone(),
                    delay_ms,
                    countdown,
                )));
                state.set_pending(Some(PendingNavigation {
                    target: target.clone(),
                    seconds_left: countdown,
                }));
                effects.push(Effect::ArmNavigation { target, delay_ms });
                return effects;
            }
            Err(err) => {
                runner_warn!("Skipping entry {} of {}: {}", position + 1, total, err);
            }
        }
    }
}

/// Cancels a running step when the list is replaced under it.
fn stop_for_list_change(state: &mut RunState) -> Vec<Effect> {
    if state.pending().is_some() || state.phase() == Phase::Running {
        state.set_pending(None);
        vec![Effect::CancelTimers]
    } else {
        Vec::new()
    }
}

fn teardown(state: &mut RunState) -> Vec<Effect> {
    state.reset();
    vec![
        Effect::CancelTimers,
        Effect::Remove(StorageKey::RUN_KEYS.to_vec()),
        Effect::Teardown,
    ]
}
