use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use runner_core::{
    decode_run_state, token_from_address, update, ControllerConfig, Effect, Msg, RunState,
    RunnerView, StorageKey,
};
use runner_logging::{runner_debug, runner_info, runner_trace};
use serde_json::Value;

use crate::store::{FileStore, KeyValueStore, StoreChange, StoreMap, Subscription, TieredStore};
use crate::timer::{TimerEvent, TimerSet};

/// Render hooks of a presentation surface.
pub trait Presenter {
    fn render(&mut self, view: &RunnerView);
    /// The session ended; remove the surface.
    fn teardown(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Continue,
    /// Leave the page: perform a full load of the target.
    Navigate(String),
    /// The session tore itself down.
    Closed,
}

/// One controller bound to one page load.
///
/// Owns the run state, the page tier of the store and the timers. A page
/// load creates a session; navigating away drops it.
pub struct Session<P: Presenter> {
    state: RunState,
    store: TieredStore,
    timers: TimerSet,
    presenter: P,
    enabled_changes: Subscription,
    opened_at: Instant,
    opened_epoch_ms: u64,
    closed: bool,
}

impl<P: Presenter> Session<P> {
    /// Opens a session for a page at `address`.
    ///
    /// Returns `None` when the address carries no debug parameter or the
    /// feature is disabled; the page then stays untouched.
    pub fn open(
        address: &str,
        durable: FileStore,
        config: ControllerConfig,
        presenter: P,
        now: Instant,
    ) -> Option<Self> {
        let Some(token) = token_from_address(address, &config.debug_param) else {
            runner_trace!("No {} parameter on {}", config.debug_param, address);
            return None;
        };

        let mut store = TieredStore::new(durable);
        let enabled = store
            .durable()
            .get(&[StorageKey::Enabled.as_str()])
            .get(StorageKey::Enabled.as_str())
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !enabled {
            runner_info!("Runner disabled; ignoring {}", address);
            return None;
        }

        let mut keys = StorageKey::run_key_names();
        keys.push(StorageKey::Enabled.as_str());
        store.rehydrate(&keys);
        let state = decode_run_state(&store.get(&keys), config);
        let enabled_changes = store.subscribe(StorageKey::Enabled.as_str());

        let mut session = Self {
            state,
            store,
            timers: TimerSet::new(),
            presenter,
            enabled_changes,
            opened_at: now,
            opened_epoch_ms: epoch_ms_now(),
            closed: false,
        };
        runner_info!("Session opened on {}", address);
        match session.dispatch(Msg::Activated { token }, now) {
            SessionOutcome::Closed => None,
            _ => Some(session),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn store(&self) -> &TieredStore {
        &self.store
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Applies one message and executes the resulting effects.
    pub fn dispatch(&mut self, msg: Msg, now: Instant) -> SessionOutcome {
        if self.closed {
            return SessionOutcome::Closed;
        }
        runner_trace!("dispatch {:?}", msg);
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg, self.epoch_ms(now));
        self.state = state;

        let outcome = self.apply(effects, now);
        if self.state.consume_dirty() && !self.closed {
            self.presenter.render(&self.state.view());
        }
        outcome
    }

    /// Delivers store notifications and due timers.
    pub fn poll(&mut self, now: Instant) -> SessionOutcome {
        let changes: Vec<StoreChange> = self.enabled_changes.try_iter().collect();
        for change in changes {
            let enabled = change
                .new_value
                .as_ref()
                .and_then(Value::as_bool)
                .unwrap_or(true);
            if let SessionOutcome::Closed = self.dispatch(Msg::EnabledChanged(enabled), now) {
                return SessionOutcome::Closed;
            }
        }

        let mut outcome = if self.closed {
            SessionOutcome::Closed
        } else {
            SessionOutcome::Continue
        };
        for event in self.timers.poll(now) {
            let msg = match event {
                TimerEvent::CountdownTick => Msg::CountdownTick,
                TimerEvent::NavigationDue => Msg::NavigationDue,
            };
            match self.dispatch(msg, now) {
                SessionOutcome::Continue => {}
                other => outcome = other,
            }
        }
        outcome
    }

    fn apply(&mut self, effects: Vec<Effect>, now: Instant) -> SessionOutcome {
        let mut outcome = SessionOutcome::Continue;
        for effect in effects {
            match effect {
                Effect::Persist(entries) => {
                    let map: StoreMap = entries
                        .into_iter()
                        .map(|(key, value)| (key.as_str().to_string(), value))
                        .collect();
                    self.store.set(map);
                }
                Effect::Remove(keys) => {
                    let names: Vec<&str> = keys.iter().map(|key| key.as_str()).collect();
                    self.store.remove(&names);
                }
                Effect::ArmNavigation { target, delay_ms } => {
                    runner_debug!("Navigation to {} armed for {} ms", target, delay_ms);
                    self.timers.arm(now, Duration::from_millis(delay_ms));
                }
                Effect::CancelTimers => self.timers.cancel(),
                Effect::Navigate { target } => {
                    self.timers.cancel();
                    outcome = SessionOutcome::Navigate(target);
                }
                Effect::Teardown => {
                    runner_info!("Session torn down");
                    self.timers.cancel();
                    self.presenter.teardown();
                    self.closed = true;
                    outcome = SessionOutcome::Closed;
                }
            }
        }
        outcome
    }

    fn epoch_ms(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.opened_at).as_millis() as u64;
        self.opened_epoch_ms + elapsed
    }
}

fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
