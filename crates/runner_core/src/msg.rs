#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A page load carrying the debug parameter activated the controller.
    Activated { token: String },
    /// User clicked Start.
    StartClicked,
    /// User clicked Pause.
    PauseClicked,
    /// User clicked Resume.
    ResumeClicked,
    /// User clicked Restart on a finished run.
    RestartClicked,
    /// User clicked Cancel.
    CancelClicked,
    /// User closed the surface (close icon or the finished-run button).
    CloseClicked,
    /// User uploaded a CSV file.
    Uploaded { name: String, text: String },
    /// User emptied the URL list.
    ListCleared,
    /// One second of the armed countdown elapsed.
    CountdownTick,
    /// The armed navigation delay elapsed.
    NavigationDue,
    /// The durable feature toggle changed, possibly from another surface.
    EnabledChanged(bool),
    /// User dragged the surface to a new position.
    WindowMoved { x: f64, y: f64 },
    /// Fallback for placeholder wiring.
    NoOp,
}
