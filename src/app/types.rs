/// Host wiring selected on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Drive the in-process motor model instead of a hardware binding
    pub simulate: bool,
    /// Inject events and answer dialogs from the terminal
    pub keyboard: bool,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest(String),
    ControllerStopped,
}
