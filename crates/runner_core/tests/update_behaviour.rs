use std::sync::Once;

use pretty_assertions::assert_eq;
use runner_core::{update, Effect, Msg, Phase, RunState, StorageKey, UploadHint};

const CSV: &str = "url,tag status\na.com,not tagged\nb.com,not tagged\nc.com,not tagged\nd.com,not tagged\n";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(runner_logging::initialize_for_tests);
}

fn uploaded(text: &str) -> RunState {
    let (state, _) = update(
        RunState::new(),
        Msg::Activated {
            token: "tok".to_string(),
        },
        0,
    );
    let (state, _) = update(
        state,
        Msg::Uploaded {
            name: "export.csv".to_string(),
            text: text.to_string(),
        },
        0,
    );
    state
}

fn armed_target(effects: &[Effect]) -> Option<&str> {
    effects.iter().find_map(|effect| match effect {
        Effect::ArmNavigation { target, .. } => Some(target.as_str()),
        _ => None,
    })
}

#[test]
fn activation_without_list_shows_upload() {
    init_logging();
    let (state, effects) = update(
        RunState::new(),
        Msg::Activated {
            token: " tok ".to_string(),
        },
        0,
    );
    assert!(state.is_active());
    assert_eq!(state.phase(), Phase::Upload);
    assert_eq!(state.debug_token(), Some("tok"));
    assert_eq!(effects.len(), 1);
}

#[test]
fn blank_token_never_activates() {
    init_logging();
    let (state, effects) = update(
        RunState::new(),
        Msg::Activated {
            token: "   ".to_string(),
        },
        0,
    );
    assert!(!state.is_active());
    assert!(effects.is_empty());
}

#[test]
fn upload_replaces_list_and_returns_to_idle() {
    init_logging();
    let state = uploaded(CSV);
    let view = state.view();
    assert_eq!(view.phase, Phase::Idle);
    assert_eq!(view.url_count, 4);
    assert_eq!(view.hint, UploadHint::Found(4));
    assert_eq!(view.filename.as_deref(), Some("export.csv"));
    assert!(view.controls.start && view.controls.start_enabled);
}

#[test]
fn invalid_upload_sets_flag_and_hint() {
    init_logging();
    let state = uploaded("url,tag status\n");
    assert!(state.upload_invalid());
    assert_eq!(state.phase(), Phase::Upload);
    assert_eq!(state.view().hint, UploadHint::Invalid);
    assert!(!state.view().controls.start_enabled);
}

#[test]
fn start_with_empty_list_stays_in_upload() {
    init_logging();
    let (state, _) = update(
        RunState::new(),
        Msg::Activated {
            token: "tok".to_string(),
        },
        0,
    );
    let (state, effects) = update(state, Msg::StartClicked, 5);
    assert_eq!(state.phase(), Phase::Upload);
    assert!(effects.is_empty());
}

#[test]
fn start_advances_index_before_navigation() {
    init_logging();
    let (state, effects) = update(uploaded(CSV), Msg::StartClicked, 1_000);

    assert_eq!(state.phase(), Phase::Running);
    assert_eq!(state.index(), 1);
    assert_eq!(armed_target(&effects), Some("https://a.com/?gtm_debug=tok"));
    assert!(effects.contains(&Effect::ArmNavigation {
        target: "https://a.com/?gtm_debug=tok".to_string(),
        delay_ms: 5_000,
    }));
    let index_persisted = effects.iter().any(|effect| {
        matches!(effect, Effect::Persist(entries)
            if entries.contains(&(StorageKey::Index, serde_json::json!(1))))
    });
    assert!(index_persisted);

    let progress = state.view().progress.expect("progress");
    assert_eq!(progress.completed, 0);
    assert_eq!(progress.total, 4);
    assert_eq!(progress.percent, 0);
    assert_eq!(progress.eta_label.as_deref(), Some("15s"));
    assert_eq!(progress.countdown, Some(5));
    assert!(!progress.is_final);
}

#[test]
fn countdown_ticks_without_touching_the_index() {
    init_logging();
    let (mut state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    for _ in 0..2 {
        let (next, effects) = update(state, Msg::CountdownTick, 0);
        assert!(effects.is_empty());
        state = next;
    }
    assert_eq!(state.index(), 1);
    let progress = state.view().progress.expect("progress");
    assert_eq!(progress.countdown, Some(3));
    assert_eq!(progress.eta_label.as_deref(), Some("13s"));
    assert_eq!(progress.completed, 0);
}

#[test]
fn pause_cancels_timers_and_keeps_index() {
    init_logging();
    let (state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let (state, effects) = update(state, Msg::PauseClicked, 100);

    assert_eq!(state.phase(), Phase::Paused);
    assert_eq!(state.index(), 1);
    assert!(state.pending().is_none());
    assert!(effects.contains(&Effect::CancelTimers));
    assert!(state.view().controls.resume);

    let (state, effects) = update(state, Msg::NavigationDue, 5_000);
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Paused);
}

#[test]
fn resume_arms_the_current_index() {
    init_logging();
    let (state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let (state, _) = update(state, Msg::PauseClicked, 1_000);
    let (state, effects) = update(state, Msg::ResumeClicked, 2_000);

    assert_eq!(state.phase(), Phase::Running);
    assert_eq!(state.index(), 2);
    assert_eq!(armed_target(&effects), Some("https://b.com/?gtm_debug=tok"));
    assert_eq!(state.timing().average_step_ms, Some(2_000));
}

#[test]
fn navigation_due_while_running_navigates_once() {
    init_logging();
    let (state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let (state, effects) = update(state, Msg::NavigationDue, 5_000);
    assert_eq!(
        effects,
        vec![Effect::Navigate {
            target: "https://a.com/?gtm_debug=tok".to_string()
        }]
    );
    let (_, effects) = update(state, Msg::NavigationDue, 5_001);
    assert!(effects.is_empty());
}

#[test]
fn cancel_clears_everything_and_tears_down() {
    init_logging();
    let (state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let (state, effects) = update(state, Msg::CancelClicked, 10);

    assert_eq!(
        effects,
        vec![
            Effect::CancelTimers,
            Effect::Remove(StorageKey::RUN_KEYS.to_vec()),
            Effect::Teardown,
        ]
    );
    assert!(!state.is_active());
    assert!(state.urls().is_empty());
    assert_eq!(state.index(), 0);
    assert_eq!(state.phase(), Phase::Idle);

    let (_, effects) = update(state, Msg::StartClicked, 20);
    assert!(effects.is_empty());
}

#[test]
fn disabling_while_running_tears_down() {
    init_logging();
    let (state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let (state, effects) = update(state, Msg::EnabledChanged(false), 10);

    assert!(effects.contains(&Effect::CancelTimers));
    assert!(effects.contains(&Effect::Remove(StorageKey::RUN_KEYS.to_vec())));
    assert!(effects.contains(&Effect::Teardown));
    assert!(!state.is_active());
    assert!(!state.enabled());
}

#[test]
fn enabling_keeps_the_run_going() {
    init_logging();
    let (state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let (state, effects) = update(state, Msg::EnabledChanged(true), 10);
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Running);
}

#[test]
fn clear_list_resets_index_and_stops_running_step() {
    init_logging();
    let (state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let (state, effects) = update(state, Msg::ListCleared, 10);

    assert_eq!(effects.first(), Some(&Effect::CancelTimers));
    assert_eq!(state.phase(), Phase::Upload);
    assert_eq!(state.index(), 0);
    assert!(state.urls().is_empty());
    assert!(!state.upload_invalid());
    assert_eq!(state.view().hint, UploadHint::None);
    assert!(state.pending().is_none());
}

#[test]
fn restart_resets_index_and_timing() {
    init_logging();
    let (mut state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    for now in [5_000, 10_000] {
        let (next, _) = update(state, Msg::PauseClicked, now);
        let (next, _) = update(next, Msg::ResumeClicked, now);
        state = next;
    }
    assert_eq!(state.index(), 3);

    let (state, effects) = update(state, Msg::RestartClicked, 60_000);
    assert_eq!(state.phase(), Phase::Running);
    assert_eq!(state.index(), 1);
    assert_eq!(armed_target(&effects), Some("https://a.com/?gtm_debug=tok"));
    assert!(effects.contains(&Effect::Remove(StorageKey::TIMING_KEYS.to_vec())));
    let timing = state.timing();
    assert_eq!(timing.started_at, Some(60_000));
    assert_eq!(timing.last_step_at, Some(60_000));
    assert_eq!(timing.average_step_ms, None);
}

#[test]
fn restart_from_paused_starts_over() {
    init_logging();
    let (state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let (state, _) = update(state, Msg::PauseClicked, 1_000);
    let (state, _) = update(state, Msg::ResumeClicked, 2_000);
    let (state, _) = update(state, Msg::PauseClicked, 3_000);
    assert_eq!(state.phase(), Phase::Paused);
    assert_eq!(state.index(), 2);

    let (state, effects) = update(state, Msg::RestartClicked, 4_000);
    assert_eq!(state.phase(), Phase::Running);
    assert_eq!(state.index(), 1);
    assert_eq!(armed_target(&effects), Some("https://a.com/?gtm_debug=tok"));
    assert_eq!(state.timing().average_step_ms, None);
}

#[test]
fn restart_from_done_starts_over() {
    init_logging();
    let (mut state, _) = update(uploaded(CSV), Msg::StartClicked, 0);
    let mut now = 0;
    while state.phase() != Phase::Done {
        now += 5_000;
        let (next, _) = update(state, Msg::PauseClicked, now);
        let (next, _) = update(next, Msg::ResumeClicked, now);
        state = next;
    }
    assert_eq!(state.index(), 4);
    assert!(state.view().controls.restart);

    let (state, effects) = update(state, Msg::RestartClicked, now + 1_000);
    assert_eq!(state.phase(), Phase::Running);
    assert_eq!(state.index(), 1);
    assert_eq!(effects.first(), Some(&Effect::CancelTimers));
    assert!(effects.contains(&Effect::Remove(StorageKey::TIMING_KEYS.to_vec())));
    assert_eq!(armed_target(&effects), Some("https://a.com/?gtm_debug=tok"));
    assert_eq!(state.timing().started_at, Some(now + 1_000));
}

#[test]
fn window_position_is_persisted_and_ignores_garbage() {
    init_logging();
    let state = uploaded(CSV);
    let (state, effects) = update(state, Msg::WindowMoved { x: 12.0, y: 40.5 }, 0);
    assert_eq!(effects.len(), 1);
    assert_eq!(state.view().position.map(|p| (p.x, p.y)), Some((12.0, 40.5)));

    let (state, effects) = update(
        state,
        Msg::WindowMoved {
            x: f64::NAN,
            y: 1.0,
        },
        0,
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().position.map(|p| p.x), Some(12.0));
}

#[test]
fn unparsable_entries_are_skipped() {
    init_logging();
    let state = uploaded("url,tag status\nhttp://exa mple.com,not tagged\nb.com,not tagged\n");
    let (state, effects) = update(state, Msg::StartClicked, 0);
    assert_eq!(state.index(), 2);
    assert_eq!(armed_target(&effects), Some("https://b.com/?gtm_debug=tok"));
}
