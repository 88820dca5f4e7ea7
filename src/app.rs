//! The embeddable front end: a registry plus the command-line dispatcher.

use crate::cli::{Cli, Commands};
use crate::commands;
use crate::config::{Environment, ServiceConfig};
use crate::error::{Error, Result};
use crate::logging;
use crate::output::{CliOutput, UserOutput};
use crate::registry::Registry;
use crate::service::{FileSink, OutputSink, Service, ServiceContext, StdoutSink, TeeSink};
use crate::state::FileStateStore;
use clap::{CommandFactory, FromArgMatches};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Name of the aggregate log, kept next to the executable.
pub const LOG_FILE_NAME: &str = "lid.log";

/// Where a [`Lid`] keeps its files and resolves relative paths.
#[derive(Debug, Clone)]
pub struct LidOptions {
    /// Binary re-executed as the supervisor child.
    pub exe: PathBuf,
    /// Relative service `cwd` and `env_file` paths resolve against this.
    pub base_dir: PathBuf,
    /// Directory holding the `service-<name>.lid` records.
    pub state_dir: PathBuf,
    pub log_file: PathBuf,
}

impl LidOptions {
    /// Defaults for the running binary: state in the system temp directory,
    /// everything else beside the executable.
    pub fn for_current_exe() -> Result<Self> {
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            log_file: dir.join(LOG_FILE_NAME),
            base_dir: dir,
            state_dir: std::env::temp_dir(),
            exe,
        })
    }
}

/// A set of services and the commands that drive them.
///
/// ```no_run
/// use lid::{Lid, ServiceConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     let mut lid = Lid::new().expect("executable path");
///     lid.register(
///         "api",
///         ServiceConfig::new(["./api-server"])
///             .cwd("api")
///             .ready_when_contains("listening")
///             .readiness_check_timeout(Duration::from_secs(10)),
///     )
///     .expect("unique name");
///     lid.run().await
/// }
/// ```
pub struct Lid {
    registry: Registry,
    exe: PathBuf,
    log_file: PathBuf,
    forward_args: Vec<OsString>,
    stdout: Option<Arc<StdoutSink>>,
}

impl Lid {
    pub fn new() -> Result<Self> {
        Ok(Self::with_options(LidOptions::for_current_exe()?))
    }

    pub fn with_options(options: LidOptions) -> Self {
        let (log_sink, stdout) = log_sink(&options.log_file);
        let context = ServiceContext {
            store: Arc::new(FileStateStore::new(options.state_dir)),
            environment: Environment::capture(),
            base_dir: options.base_dir,
            log_sink,
        };

        Self {
            registry: Registry::new(context),
            exe: options.exe,
            log_file: options.log_file,
            forward_args: Vec::new(),
            stdout: Some(stdout),
        }
    }

    /// Build on an existing context (custom store or sinks).
    pub fn with_context(context: ServiceContext, exe: PathBuf, log_file: PathBuf) -> Self {
        Self {
            registry: Registry::new(context),
            exe,
            log_file,
            forward_args: Vec::new(),
            stdout: None,
        }
    }

    pub fn register(&mut self, name: impl Into<String>, config: ServiceConfig) -> Result<Arc<Service>> {
        self.registry.register(name, config)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Arguments placed before `spawn <name>` when re-executing the binary,
    /// so the supervisor child sees the same service catalog.
    pub fn set_forward_args(&mut self, args: Vec<OsString>) {
        self.forward_args = args;
    }

    pub fn forward_args(&self) -> &[OsString] {
        &self.forward_args
    }

    pub async fn execute(&self, command: Commands, out: &dyn UserOutput) -> Result<()> {
        match command {
            Commands::List => commands::run_list(self, out).await,
            Commands::Start { services } => commands::run_start(self, &services, out).await,
            Commands::Stop { services } => commands::run_stop(self, &services, out).await,
            Commands::Restart { services } => commands::run_restart(self, &services, out).await,
            Commands::Logs { services } => commands::run_logs(self, &services, out).await,
            Commands::Spawn { service, detached } => {
                if detached {
                    if let Some(stdout) = &self.stdout {
                        stdout.quiet_after_verdict();
                    }
                }
                commands::run_spawn(self, &service).await
            }
        }
    }

    /// Parse the process arguments and run the command.
    pub async fn run(&self) -> ExitCode {
        self.run_with_args(std::env::args_os()).await
    }

    pub async fn run_with_args<I, T>(&self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = match Cli::command()
            .after_help(self.services_help())
            .try_get_matches_from(args)
            .and_then(|matches| Cli::from_arg_matches(&matches))
        {
            Ok(cli) => cli,
            Err(e) => e.exit(),
        };

        logging::init_tracing(
            matches!(cli.command, Commands::Spawn { .. }),
            &self.log_file,
        );

        match self.execute(cli.command, &CliOutput).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                report_error(&e);
                ExitCode::FAILURE
            }
        }
    }

    fn services_help(&self) -> String {
        if self.registry.is_empty() {
            return "Available services: none".to_string();
        }
        let mut help = String::from("Available services:");
        for name in self.registry.names() {
            help.push_str("\n  ");
            help.push_str(name);
        }
        help
    }
}

/// Print an error and its hint to stderr.
pub fn report_error(e: &Error) {
    eprintln!("Error: {}", e);
    if let Some(suggestion) = e.suggestion() {
        eprintln!("\nHint: {}", suggestion);
    }
}

/// Service loggers write to stdout and append to the aggregate log.
fn log_sink(log_file: &Path) -> (Arc<dyn OutputSink>, Arc<StdoutSink>) {
    let stdout = Arc::new(StdoutSink::new());
    let console: Arc<dyn OutputSink> = stdout.clone();
    let sink: Arc<dyn OutputSink> = match FileSink::append(log_file) {
        Ok(file) => Arc::new(TeeSink::new(vec![console, Arc::new(file)])),
        Err(e) => {
            tracing::warn!(
                "Cannot open {}: {}; service logs go to stdout only",
                log_file.display(),
                e
            );
            console
        }
    };
    (sink, stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CapturedOutput;
    use crate::service::MemorySink;
    use crate::state::MemoryStateStore;

    fn lid() -> Lid {
        let context = ServiceContext {
            store: Arc::new(MemoryStateStore::new()),
            environment: Environment::default(),
            base_dir: std::env::temp_dir(),
            log_sink: Arc::new(MemorySink::new()),
        };
        Lid::with_context(context, PathBuf::from("/bin/false"), PathBuf::from("/nonexistent/lid.log"))
    }

    #[test]
    fn test_services_help_lists_names() {
        let mut lid = lid();
        assert_eq!(lid.services_help(), "Available services: none");

        lid.register("web", ServiceConfig::new(["true"])).unwrap();
        lid.register("api", ServiceConfig::new(["true"])).unwrap();
        assert_eq!(lid.services_help(), "Available services:\n  api\n  web");
    }

    #[tokio::test]
    async fn test_stop_on_never_started_service() {
        let mut lid = lid();
        lid.register("api", ServiceConfig::new(["true"])).unwrap();
        let out = CapturedOutput::new();

        lid.execute(Commands::Stop { services: vec![] }, &out)
            .await
            .unwrap();

        assert!(out.text().contains("api: service already down"));
    }

    #[tokio::test]
    async fn test_unknown_service_is_an_error() {
        let lid = lid();
        let out = CapturedOutput::new();

        let err = lid
            .execute(
                Commands::Start {
                    services: vec!["ghost".to_string()],
                },
                &out,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ServiceNotFound(ref n) if n == "ghost"));
        assert!(out.text().contains("Unknown service: ghost"));
    }

    #[tokio::test]
    async fn test_list_shows_stopped_services() {
        let mut lid = lid();
        lid.register("api", ServiceConfig::new(["true"])).unwrap();
        let out = CapturedOutput::new();

        lid.execute(Commands::List, &out).await.unwrap();

        let text = out.text();
        assert!(text.contains("Name"));
        assert!(text.contains("api"));
        assert!(text.contains("Stopped"));
    }

    #[tokio::test]
    async fn test_start_reports_env_file_error_before_spawning() {
        let mut lid = lid();
        lid.register(
            "api",
            ServiceConfig::new(["true"]).env_file("definitely-missing.env"),
        )
        .unwrap();
        let out = CapturedOutput::new();

        let err = lid
            .execute(Commands::Start { services: vec![] }, &out)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::CommandFailed(ref names) if names == &["api"]));
        assert!(out.text().contains("definitely-missing.env"));
    }
}
