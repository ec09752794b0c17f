use std::fmt::{Display, Formatter, Result as FormatResult};

/// What the layer above should do after a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorDirective {
    /// The condition was absorbed; keep running.
    Continue,
    /// Rebuild the connection manager inside this process.
    RestartInProcess,
    /// Exit with the restart code and let the process supervisor respawn.
    RestartProcess,
    /// Stop for good with this exit code.
    Stop { code: i32 },
}

impl Display for SupervisorDirective {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            SupervisorDirective::Continue => formatter.write_str("continue"),
            SupervisorDirective::RestartInProcess => formatter.write_str("restart in process"),
            SupervisorDirective::RestartProcess => formatter.write_str("restart process"),
            SupervisorDirective::Stop { code } => write!(formatter, "stop (exit code {code})"),
        }
    }
}
