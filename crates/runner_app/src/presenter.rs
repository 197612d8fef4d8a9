//! Terminal rendering of the runner panel.
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use runner_core::{ControlsView, ProgressView, RunnerView, UploadHint};
use runner_engine::Presenter;

#[derive(Debug)]
enum Sink {
    Stdout,
    Memory(Vec<u8>),
}

/// Shared line output. Clones write to the same sink.
#[derive(Debug, Clone)]
pub struct Console {
    sink: Arc<Mutex<Sink>>,
}

impl Console {
    pub fn stdout() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Stdout)),
        }
    }

    /// Collects output in memory; read it back with [`Console::captured`].
    pub fn memory() -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink::Memory(Vec::new()))),
        }
    }

    pub fn line(&self, text: impl AsRef<str>) {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        let text = text.as_ref();
        match &mut *sink {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "{text}");
                let _ = out.flush();
            }
            Sink::Memory(buffer) => {
                buffer.extend_from_slice(text.as_bytes());
                buffer.push(b'\n');
            }
        }
    }

    pub fn captured(&self) -> String {
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match &*sink {
            Sink::Stdout => String::new(),
            Sink::Memory(buffer) => String::from_utf8_lossy(buffer).into_owned(),
        }
    }
}

/// Prints the panel, repeating only the lines that changed since the
/// previous render.
#[derive(Debug)]
pub struct TerminalPresenter {
    console: Console,
    last: Vec<String>,
}

impl TerminalPresenter {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            last: Vec::new(),
        }
    }
}

impl Presenter for TerminalPresenter {
    fn render(&mut self, view: &RunnerView) {
        let lines = format_view(view);
        for (slot, line) in lines.iter().enumerate() {
            if self.last.get(slot) != Some(line) {
                self.console.line(line);
            }
        }
        self.last = lines;
    }

    fn teardown(&mut self) {
        self.last.clear();
        self.console.line("[runner] panel closed");
    }
}

/// Fixed-slot panel lines: header, list, progress and controls.
pub fn format_view(view: &RunnerView) -> Vec<String> {
    let header = format!("[{}] {}", view.phase.as_str(), view.intro);
    vec![
        header,
        format_list(view),
        view.progress
            .as_ref()
            .map(format_progress)
            .unwrap_or_else(|| "Progress: -".to_string()),
        format!("Controls: {}", format_controls(&view.controls)),
    ]
}

fn format_list(view: &RunnerView) -> String {
    let file = view.filename.as_deref().unwrap_or("no file");
    match view.hint {
        UploadHint::None => format!("List: {file}"),
        hint => format!("List: {file} | {hint}"),
    }
}

pub fn format_progress(progress: &ProgressView) -> String {
    let mut text = format!(
        "Progress: {}/{} ({}%) | {}",
        progress.completed, progress.total, progress.percent, progress.target_label
    );
    if let Some(eta) = &progress.eta_label {
        text.push_str(&format!(" | ETA {eta}"));
    }
    if let Some(seconds) = progress.countdown {
        text.push_str(&format!(" | next in {seconds}s"));
    }
    if progress.is_final {
        text.push_str(" | last URL");
    }
    text
}

pub fn format_controls(controls: &ControlsView) -> String {
    let mut names = Vec::new();
    if controls.upload {
        names.push("upload".to_string());
    }
    if controls.start {
        let label = if controls.start_enabled {
            "start"
        } else {
            "start (disabled)"
        };
        names.push(label.to_string());
    }
    for (visible, name) in [
        (controls.pause, "pause"),
        (controls.resume, "resume"),
        (controls.restart, "restart"),
        (controls.cancel, "cancel"),
        (controls.done_close, "close"),
    ] {
        if visible {
            names.push(name.to_string());
        }
    }
    names.join(" ")
}
