use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Service '{0}' is already running")]
    #[diagnostic(
        code(lid::service::already_running),
        help("Stop it first with: lid stop {0}")
    )]
    AlreadyRunning(String),

    #[error("No process record for service '{0}'")]
    #[diagnostic(code(lid::state::not_found))]
    ProcessNotFound(String),

    #[error("Process record {} is corrupt: {reason}", .path.display())]
    #[diagnostic(
        code(lid::state::corrupt),
        help("Remove the file; the service will be treated as stopped")
    )]
    ProcessCorrupt { path: PathBuf, reason: String },

    #[error("Service '{service}' did not become ready within {timeout:?}")]
    #[diagnostic(
        code(lid::service::readiness_timeout),
        help("Check the output with `lid logs` or raise readiness_check_timeout")
    )]
    ReadinessTimeout { service: String, timeout: Duration },

    #[error("Service '{service}' did not exit within {timeout:?}, forced kill sent")]
    #[diagnostic(code(lid::service::shutdown_timeout))]
    ShutdownTimeout { service: String, timeout: Duration },

    #[error("Failed to spawn service '{service}': {source}")]
    #[diagnostic(
        code(lid::service::spawn_failed),
        help("Check that the command exists and is executable")
    )]
    SpawnFailed {
        service: String,
        #[source]
        source: io::Error,
    },

    /// Carries the before-start hook's own message verbatim.
    #[error("{0}")]
    #[diagnostic(code(lid::hook::rejected))]
    HookRejected(String),

    #[error("Service '{0}' is registered more than once")]
    #[diagnostic(code(lid::registry::duplicate))]
    DuplicateService(String),

    #[error("Service not found: {0}")]
    #[diagnostic(
        code(lid::service::not_found),
        help("List the known services with `lid list`")
    )]
    ServiceNotFound(String),

    #[error("Environment file {}: {source}", .path.display())]
    #[diagnostic(code(lid::env::file))]
    EnvFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} service(s) failed: {}", .0.len(), .0.join(", "))]
    #[diagnostic(
        code(lid::command::failed),
        help("Check the output above or run `lid logs`")
    )]
    CommandFailed(Vec<String>),

    #[error("Invalid PID {pid}: {reason}")]
    InvalidPid { pid: u32, reason: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::AlreadyRunning(name) => Some(format!(
                "Use 'lid restart {}' to replace the running process.",
                name
            )),
            Error::ServiceNotFound(_) => {
                Some("Run 'lid list' to see the registered services.".to_string())
            }
            Error::ProcessCorrupt { path, .. } => Some(format!(
                "Delete {} and start the service again.",
                path.display()
            )),
            Error::ReadinessTimeout { service, .. } => Some(format!(
                "Inspect the output with 'lid logs {}'. The service was stopped.",
                service
            )),
            Error::EnvFile { path, .. } => Some(format!(
                "Create {} or remove env_file from the service declaration.",
                path.display()
            )),
            Error::Config(_) | Error::Yaml(_) => {
                Some("Check lid.yaml next to the lid executable.".to_string())
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

/// Validates and converts a u32 PID to nix::unistd::Pid for signalling.
/// Rejects PID 0 (process group), PID 1 (init), and values > i32::MAX.
pub fn validate_pid(pid: u32, service_name: &str) -> Result<nix::unistd::Pid> {
    if pid == 0 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "PID 0 is invalid for service '{}' (refers to process group, not a process)",
                service_name
            ),
        });
    }
    if pid == 1 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "refusing to signal PID 1 (init) for service '{}'",
                service_name
            ),
        });
    }
    if pid > i32::MAX as u32 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "PID {} exceeds i32::MAX for service '{}'",
                pid, service_name
            ),
        });
    }
    Ok(nix::unistd::Pid::from_raw(pid as i32))
}

/// Same as validate_pid but allows PID 1; use for read-only existence checks.
pub fn validate_pid_for_check(pid: u32) -> Option<nix::unistd::Pid> {
    if pid == 0 || pid > i32::MAX as u32 {
        return None;
    }
    Some(nix::unistd::Pid::from_raw(pid as i32))
}
