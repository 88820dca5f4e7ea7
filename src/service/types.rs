use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// How a supervised child ended, as handed to `on_exit`.
///
/// A normal zero exit is still delivered (`code == Some(0)`) so the hook can
/// decide whether to restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, when the process exited on its own.
    pub code: Option<i32>,
    /// Terminating signal number, when the process was killed by one.
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(0), _) => write!(f, "exited with no error"),
            (Some(code), _) => write!(f, "exit status {}", code),
            (None, Some(sig)) => match nix::sys::signal::Signal::try_from(sig) {
                Ok(signal) => write!(f, "killed by {}", signal),
                Err(_) => write!(f, "killed by signal {}", sig),
            },
            (None, None) => write!(f, "exited for an unknown reason"),
        }
    }
}

/// Result of a successful `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No live process was recorded; nothing was touched.
    AlreadyDown,
    /// The process went away within the graceful timeout.
    Stopped,
}
