use crate::service::{ExitInfo, OutputSink, ServiceHandle};
use nix::sys::signal::Signal;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default for both the graceful shutdown and the readiness timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Error a `before_start` hook returns to refuse a start.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Returns true for the first output line that shows the service is up.
pub type ReadinessCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub type BeforeStartHook =
    Arc<dyn Fn(&ServiceHandle<'_>) -> std::result::Result<(), HookError> + Send + Sync>;

pub type AfterStartHook = Arc<dyn Fn(&ServiceHandle<'_>) + Send + Sync>;

pub type OnExitHook = Arc<dyn Fn(&ServiceHandle<'_>, ExitInfo) + Send + Sync>;

/// Everything needed to run one service. Immutable once registered.
///
/// Relative `cwd` and `env_file` paths resolve against the registry's base
/// directory (the directory holding the `lid` executable by default); the env
/// file is looked up inside `cwd`.
#[derive(Clone)]
pub struct ServiceConfig {
    pub cwd: Option<PathBuf>,
    pub command: Vec<String>,
    pub env_file: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub graceful_shutdown_timeout: Duration,
    pub readiness_check_timeout: Duration,
    pub readiness_check: Option<ReadinessCheck>,
    pub exit_signal: Signal,
    pub before_start: Option<BeforeStartHook>,
    pub after_start: Option<AfterStartHook>,
    pub on_exit: Option<OnExitHook>,
    /// Destination for the child's stdout. Defaults to the service logger.
    pub stdout: Option<Arc<dyn OutputSink>>,
    /// Destination for the child's stderr. Defaults to the service logger.
    pub stderr: Option<Arc<dyn OutputSink>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cwd: None,
            command: Vec::new(),
            env_file: None,
            env: Vec::new(),
            graceful_shutdown_timeout: DEFAULT_TIMEOUT,
            readiness_check_timeout: DEFAULT_TIMEOUT,
            readiness_check: None,
            exit_signal: Signal::SIGTERM,
            before_start: None,
            after_start: None,
            on_exit: None,
            stdout: None,
            stderr: None,
        }
    }
}

impl ServiceConfig {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn graceful_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_shutdown_timeout = timeout;
        self
    }

    pub fn readiness_check_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_check_timeout = timeout;
        self
    }

    pub fn exit_signal(mut self, signal: Signal) -> Self {
        self.exit_signal = signal;
        self
    }

    pub fn ready_when<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.readiness_check = Some(Arc::new(check));
        self
    }

    /// Shorthand for a readiness check that looks for `needle` in a line.
    pub fn ready_when_contains(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        self.ready_when(move |line| line.contains(&needle))
    }

    pub fn before_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ServiceHandle<'_>) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        self.before_start = Some(Arc::new(hook));
        self
    }

    pub fn after_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ServiceHandle<'_>) + Send + Sync + 'static,
    {
        self.after_start = Some(Arc::new(hook));
        self
    }

    pub fn on_exit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ServiceHandle<'_>, ExitInfo) + Send + Sync + 'static,
    {
        self.on_exit = Some(Arc::new(hook));
        self
    }

    pub fn stdout(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.stdout = Some(sink);
        self
    }

    pub fn stderr(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.stderr = Some(sink);
        self
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("cwd", &self.cwd)
            .field("command", &self.command)
            .field("env_file", &self.env_file)
            .field("env", &self.env)
            .field("graceful_shutdown_timeout", &self.graceful_shutdown_timeout)
            .field("readiness_check_timeout", &self.readiness_check_timeout)
            .field("readiness_check", &self.readiness_check.is_some())
            .field("exit_signal", &self.exit_signal)
            .field("before_start", &self.before_start.is_some())
            .field("after_start", &self.after_start.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::new(["sleep", "1"]);
        assert_eq!(config.command, vec!["sleep", "1"]);
        assert_eq!(config.graceful_shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.readiness_check_timeout, Duration::from_secs(5));
        assert_eq!(config.exit_signal, Signal::SIGTERM);
        assert!(config.readiness_check.is_none());
    }

    #[test]
    fn test_ready_when_contains() {
        let config = ServiceConfig::new(["x"]).ready_when_contains("Server started at");
        let check = config.readiness_check.unwrap();
        assert!(check("Server started at :8080"));
        assert!(!check("booting"));
    }
}
