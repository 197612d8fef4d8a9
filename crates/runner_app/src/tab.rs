//! A single simulated browser tab.
//!
//! Every page load opens a fresh [`Session`]; the durable store is the only
//! thing that survives between loads.
use std::fs;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use runner_core::{
    token_from_address, ControllerConfig, Msg, SettingsView, StorageKey, ToggleOutcome,
};
use runner_engine::{FileStore, KeyValueStore, Navigator, Session, SessionOutcome, StoreMap};
use runner_logging::{runner_error, runner_info, runner_warn, set_page_generation};
use serde_json::Value;

use crate::commands::{self, Command, HELP};
use crate::presenter::{format_view, Console, TerminalPresenter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Tab<N: Navigator> {
    navigator: N,
    runtime: tokio::runtime::Runtime,
    durable: FileStore,
    config: ControllerConfig,
    console: Console,
    address: Option<String>,
    generation: u64,
    session: Option<Session<TerminalPresenter>>,
}

impl<N: Navigator> Tab<N> {
    pub fn new(
        navigator: N,
        runtime: tokio::runtime::Runtime,
        durable: FileStore,
        config: ControllerConfig,
        console: Console,
    ) -> Self {
        Self {
            navigator,
            runtime,
            durable,
            config,
            console,
            address: None,
            generation: 0,
            session: None,
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session(&self) -> Option<&Session<TerminalPresenter>> {
        self.session.as_ref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(Session::next_deadline)
    }

    /// Navigates to `url` and opens a session on whatever page loads.
    pub fn open(&mut self, url: &str, now: Instant) {
        self.session = None;
        let address = match self.runtime.block_on(self.navigator.navigate(url)) {
            Ok(load) => {
                runner_info!(
                    "Loaded {} (status {}, {} redirects, {} bytes)",
                    load.address,
                    load.status,
                    load.redirect_count,
                    load.body_bytes
                );
                if token_from_address(url, &self.config.debug_param).is_some()
                    && token_from_address(&load.address, &self.config.debug_param).is_none()
                {
                    runner_warn!(
                        "{} dropped the {} parameter; the runner will not resume there",
                        load.address,
                        self.config.debug_param
                    );
                }
                load.address
            }
            Err(err) => {
                runner_error!("Navigation to {} failed: {}", url, err);
                self.console.line(format!("[tab] failed to load {url}: {err}"));
                url.to_string()
            }
        };
        self.load_page(address, Instant::now().max(now));
    }

    fn load_page(&mut self, address: String, now: Instant) {
        self.session = None;
        self.generation += 1;
        set_page_generation(self.generation);
        self.console.line(format!("[tab] page {}: {}", self.generation, address));
        self.session = Session::open(
            &address,
            self.durable.clone(),
            self.config.clone(),
            TerminalPresenter::new(self.console.clone()),
            now,
        );
        if self.session.is_none() {
            runner_info!("Runner inactive on {}", address);
        }
        self.address = Some(address);
    }

    /// Delivers due timers and store notifications to the session.
    pub fn poll(&mut self, now: Instant) {
        let outcome = match self.session.as_mut() {
            Some(session) => session.poll(now),
            None => return,
        };
        self.follow(outcome, now);
    }

    fn follow(&mut self, outcome: SessionOutcome, now: Instant) {
        match outcome {
            SessionOutcome::Continue => {}
            SessionOutcome::Navigate(target) => self.open(&target, now),
            SessionOutcome::Closed => self.session = None,
        }
    }

    fn dispatch(&mut self, msg: Msg, now: Instant) {
        let outcome = match self.session.as_mut() {
            Some(session) => session.dispatch(msg, now),
            None => {
                self.console.line("[tab] the runner is not active on this page");
                return;
            }
        };
        self.follow(outcome, now);
    }

    pub fn handle(&mut self, command: Command, now: Instant) -> Flow {
        match command {
            Command::Open(url) => self.open(&url, now),
            Command::Reload => match self.address.clone() {
                Some(address) => self.load_page(address, now),
                None => self.console.line("[tab] no page loaded"),
            },
            Command::Start => self.dispatch(Msg::StartClicked, now),
            Command::Pause => self.dispatch(Msg::PauseClicked, now),
            Command::Resume => self.dispatch(Msg::ResumeClicked, now),
            Command::Restart => self.dispatch(Msg::RestartClicked, now),
            Command::Cancel => self.dispatch(Msg::CancelClicked, now),
            Command::Close => self.dispatch(Msg::CloseClicked, now),
            Command::Clear => self.dispatch(Msg::ListCleared, now),
            Command::Move { x, y } => self.dispatch(Msg::WindowMoved { x, y }, now),
            Command::Upload(path) => match fs::read_to_string(&path) {
                Ok(text) => {
                    let name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    self.dispatch(Msg::Uploaded { name, text }, now);
                }
                Err(err) => {
                    runner_warn!("Failed to read {:?}: {}", path, err);
                    self.console
                        .line(format!("[tab] cannot read {}: {err}", path.display()));
                }
            },
            Command::Enable => self.toggle(true, now),
            Command::Disable => self.toggle(false, now),
            Command::Status => self.print_status(),
            Command::Help => self.console.line(HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn settings(&self) -> SettingsView {
        SettingsView::from_stored(
            &self
                .durable
                .get(&[StorageKey::Enabled.as_str(), StorageKey::Phase.as_str()]),
        )
    }

    fn toggle(&mut self, on: bool, now: Instant) {
        let settings = self.settings();
        match settings.toggle(on) {
            ToggleOutcome::Refused => {
                let reason = if settings.locked {
                    "a run is in progress"
                } else {
                    settings.status()
                };
                self.console.line(format!("[settings] unchanged: {reason}"));
                return;
            }
            ToggleOutcome::Disabled => {
                self.write_enabled(false);
                self.poll(now);
                if self.session.is_none() {
                    // Nothing on this page listened; clear the run here.
                    self.durable.remove(&StorageKey::run_key_names());
                }
            }
            ToggleOutcome::EnabledReloadRequested => {
                self.session = None;
                self.write_enabled(true);
                if let Some(address) = self.address.clone() {
                    self.load_page(address, now);
                }
            }
        }
        self.console
            .line(format!("[settings] {}", self.settings().status()));
    }

    fn write_enabled(&mut self, enabled: bool) {
        let mut entries = StoreMap::new();
        entries.insert(StorageKey::Enabled.as_str().to_string(), Value::Bool(enabled));
        self.durable.set(entries);
    }

    fn print_status(&self) {
        self.console
            .line(format!("[settings] {}", self.settings().status()));
        match (&self.address, &self.session) {
            (None, _) => self.console.line("[tab] no page loaded"),
            (Some(address), None) => self
                .console
                .line(format!("[tab] {address} (runner inactive)")),
            (Some(address), Some(session)) => {
                self.console.line(format!("[tab] {address}"));
                for line in format_view(&session.state().view()) {
                    self.console.line(line);
                }
            }
        }
    }
}

/// Runs the tab until `quit`, or until input ends and no navigation is armed.
pub fn run<N: Navigator>(mut tab: Tab<N>, lines: Receiver<String>, console: &Console) {
    let mut input_open = true;
    loop {
        let now = Instant::now();
        tab.poll(now);
        let deadline = tab.next_deadline();

        if !input_open {
            match deadline {
                Some(deadline) => {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                    continue;
                }
                None => break,
            }
        }

        let received = match deadline {
            Some(deadline) => {
                lines.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(line) => match commands::parse(&line) {
                Ok(Some(command)) => {
                    if tab.handle(command, Instant::now()) == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(err) => console.line(format!("[input] {err}")),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                runner_info!("Input closed");
                input_open = false;
            }
        }
    }
}
