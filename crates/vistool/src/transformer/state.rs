use std::fmt;

/// Lifecycle of a transformer.
///
/// ```text
/// Unconfigured --init--> Configured --start--> Running --stop--> Stopped
///                          |   ^                                   ^
///                          |   +-- init / add_op                   |
///                          +------------------stop-----------------+
/// ```
///
/// `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Unconfigured,
    Configured,
    Running,
    Stopped,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Unconfigured => "unconfigured",
            State::Configured => "configured",
            State::Running => "running",
            State::Stopped => "stopped",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
