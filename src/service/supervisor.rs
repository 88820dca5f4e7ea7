use super::output::{OutputSink, ServiceLogger};
use super::process::is_process_alive;
use super::{ExitInfo, ServiceHandle};
use crate::config::env_loader::{load_env_file, merge_environment};
use crate::config::{Environment, ReadinessCheck, ServiceConfig};
use crate::error::{Error, Result};
use crate::sentinels::{NO_READINESS_CHECK, READINESS_CHECK_FAILED, READINESS_CHECK_PASSED};
use crate::state::{ProcessRecord, ServiceStatus, StateStore};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// How long to wait for the output forwarder once the child is gone.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

/// State shared by every service of one registry.
pub struct ServiceContext {
    pub store: Arc<dyn StateStore>,
    pub environment: Environment,
    /// Relative `cwd` and `env_file` paths resolve against this directory.
    pub base_dir: PathBuf,
    /// Where service loggers write (stdout and `lid.log` in the binary).
    pub log_sink: Arc<dyn OutputSink>,
}

/// One supervised service: configuration plus the engine that runs it.
///
/// The persisted record is the only runtime state; nothing about the child is
/// cached in memory, so any process holding a `Service` for the same name and
/// store sees the same answers.
pub struct Service {
    name: String,
    config: ServiceConfig,
    context: Arc<ServiceContext>,
    logger: ServiceLogger,
    pub(super) restart_requested: AtomicBool,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

struct OutputLine {
    stream: Stream,
    text: String,
}

type ReadinessGate = (oneshot::Sender<bool>, ReadinessCheck);

impl Service {
    pub fn new(name: impl Into<String>, config: ServiceConfig, context: Arc<ServiceContext>) -> Self {
        let name = name.into();
        let logger = ServiceLogger::new(name.clone(), context.log_sink.clone());
        Self {
            name,
            config,
            context,
            logger,
            restart_requested: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn logger(&self) -> &ServiceLogger {
        &self.logger
    }

    pub(crate) fn handle(&self) -> ServiceHandle<'_> {
        ServiceHandle::new(self)
    }

    /// The persisted record. Corrupt or unreadable records read as stopped.
    pub fn record(&self) -> ProcessRecord {
        match self.context.store.read(&self.name) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Service '{}': {}; treating as stopped", self.name, e);
                ProcessRecord::STOPPED
            }
        }
    }

    /// Where the record lives, for stores backed by files.
    pub fn record_location(&self) -> Option<PathBuf> {
        self.context.store.location(&self.name)
    }

    pub(super) fn write_record(&self, status: ServiceStatus, pid: u32) -> Result<()> {
        let previous = self.record().status;
        if !previous.is_valid_transition(status) {
            // Expected when replacing a stale record left by a crashed supervisor.
            tracing::debug!(
                "Service '{}': unusual transition {} -> {}",
                self.name,
                previous,
                status
            );
        }

        let record = ProcessRecord::new(status, pid as i32);
        self.context.store.write(&self.name, record)
    }

    /// Status exactly as persisted, without probing the pid.
    pub fn cached_status(&self) -> ServiceStatus {
        self.record().status
    }

    /// Status with stale records corrected: an active status whose pid is
    /// gone reads as `Stopped`.
    pub fn status(&self) -> ServiceStatus {
        let record = self.record();
        if record.status.is_active() && !is_process_alive(record.pid_u32()) {
            ServiceStatus::Stopped
        } else {
            record.status
        }
    }

    /// The persisted pid (0 when none).
    pub fn pid(&self) -> u32 {
        self.record().pid_u32()
    }

    /// The persisted pid, if that process is alive.
    pub fn running_pid(&self) -> Option<u32> {
        let pid = self.pid();
        (pid != 0 && is_process_alive(pid)).then_some(pid)
    }

    pub fn is_running(&self) -> bool {
        self.running_pid().is_some()
    }

    /// Build the child command: argv, working directory and environment.
    ///
    /// Fails if the env file cannot be read, before anything is spawned.
    pub fn prepare(&self) -> Result<Command> {
        let Some((program, args)) = self.config.command.split_first() else {
            return Err(Error::Config(format!(
                "service '{}' has an empty command",
                self.name
            )));
        };

        let work_dir = self
            .config
            .cwd
            .as_ref()
            .map(|cwd| self.context.base_dir.join(cwd));

        let from_file = match &self.config.env_file {
            Some(env_file) => {
                let dir = work_dir.as_ref().unwrap_or(&self.context.base_dir);
                load_env_file(dir.join(env_file))?
            }
            None => Vec::new(),
        };
        let environment =
            merge_environment(&self.context.environment, from_file, &self.config.env);

        tracing::debug!(
            "Preparing '{}' in work_dir: {:?}, command: {:?}",
            self.name,
            work_dir,
            self.config.command
        );

        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .envs(environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            // Own process group so stop() can signal grandchildren too.
            .process_group(0);

        if let Some(dir) = work_dir {
            cmd.current_dir(dir);
        }

        Ok(cmd)
    }

    /// Run the service until its child exits.
    ///
    /// Returns after an exit (intentional or not) or on a startup failure. If
    /// `on_exit` asked for a restart through its handle, a fresh run begins
    /// once `Exited` has been committed.
    pub async fn start(&self) -> Result<()> {
        loop {
            self.restart_requested.store(false, Ordering::SeqCst);

            if let Err(e) = self.run_once().await {
                self.logger.log(&e);
                return Err(e);
            }

            if !self.restart_requested.swap(false, Ordering::SeqCst) {
                return Ok(());
            }
            self.logger.log("Restarting");
        }
    }

    async fn run_once(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyRunning(self.name.clone()));
        }

        let mut cmd = self.prepare()?;
        self.logger.log("Starting");

        if let Some(hook) = &self.config.before_start {
            if let Err(e) = hook(&self.handle()) {
                self.logger.log(format!("Rejected start: {}", e));
                return Err(Error::HookRejected(e.to_string()));
            }
        }

        let mut child = cmd.spawn().map_err(|source| Error::SpawnFailed {
            service: self.name.clone(),
            source,
        })?;
        let pid = child.id().ok_or_else(|| Error::SpawnFailed {
            service: self.name.clone(),
            source: std::io::Error::other("child exited before its pid was known"),
        })?;
        self.logger.log(format!("Started with PID: {}", pid));

        let (gate, ready_rx) = match &self.config.readiness_check {
            Some(check) => {
                let (tx, rx) = oneshot::channel();
                (Some((tx, check.clone())), Some(rx))
            }
            None => (None, None),
        };
        let mut forwarder = self.spawn_forwarder(&mut child, gate);

        let initial = if ready_rx.is_some() {
            ServiceStatus::Starting
        } else {
            ServiceStatus::Running
        };
        if let Err(e) = self.write_record(initial, pid) {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(e);
        }

        let ready = match ready_rx {
            None => {
                self.logger.log(NO_READINESS_CHECK);
                true
            }
            Some(rx) => {
                self.logger.log("Waiting for readiness check");
                let timeout = self.config.readiness_check_timeout;
                match tokio::time::timeout(timeout, rx).await {
                    Ok(Ok(true)) => {
                        self.promote_to_running(pid)?;
                        self.logger.log(READINESS_CHECK_PASSED);
                        true
                    }
                    Ok(_) => {
                        self.logger.log(READINESS_CHECK_FAILED);
                        false
                    }
                    Err(_) => {
                        self.logger.log("Readiness check timed out");
                        self.abort_after_timeout(&mut child, &mut forwarder).await;
                        return Err(Error::ReadinessTimeout {
                            service: self.name.clone(),
                            timeout,
                        });
                    }
                }
            }
        };

        if ready {
            if let Some(hook) = &self.config.after_start {
                hook(&self.handle());
            }
        }

        self.logger.log("Waiting for process to exit");
        let status = child.wait().await?;
        drain(&mut forwarder).await;

        self.handle_exit(pid, ExitInfo::from(status))
    }

    /// `Starting` becomes `Running` only if nobody began stopping us meanwhile.
    fn promote_to_running(&self, pid: u32) -> Result<()> {
        let record = self.record();
        if record.status == ServiceStatus::Starting && record.pid_u32() == pid {
            self.write_record(ServiceStatus::Running, pid)?;
        }
        Ok(())
    }

    async fn abort_after_timeout(&self, child: &mut Child, forwarder: &mut JoinHandle<()>) {
        if let Err(e) = self.stop().await {
            self.logger.log(format!("Stop after readiness timeout: {}", e));
        }
        let _ = child.wait().await;
        drain(forwarder).await;

        // The child may have died on its own while a grandchild kept the
        // pipes open; stop() then had nothing to do.
        if self.record().status.is_active() {
            if let Err(e) = self.write_record(ServiceStatus::Stopped, 0) {
                tracing::warn!("Service '{}': failed to record stop: {}", self.name, e);
            }
        }
    }

    /// Decide between a requested stop and an unsolicited exit.
    ///
    /// `Stopped` and `Stopping` both mean a shutdown sequence owns the
    /// record; it writes `Stopped` itself and `on_exit` must not run.
    /// An active record naming another pid belongs to a newer process and
    /// is left alone.
    fn handle_exit(&self, pid: u32, info: ExitInfo) -> Result<()> {
        let record = self.record();
        if matches!(
            record.status,
            ServiceStatus::Stopped | ServiceStatus::Stopping
        ) {
            self.logger.log("Stopped");
            return Ok(());
        }
        if record.status.is_active() && record.pid_u32() != pid {
            self.logger.log(format!("Exited: {}", info));
            tracing::debug!(
                "Service '{}': pid {} exited but the record now names pid {}",
                self.name,
                pid,
                record.pid
            );
            return Ok(());
        }

        self.logger.log(format!("Exited: {}", info));
        self.write_record(ServiceStatus::Exited, 0)?;

        if let Some(hook) = &self.config.on_exit {
            hook(&self.handle(), info);
        }
        Ok(())
    }

    fn spawn_forwarder(&self, child: &mut Child, gate: Option<ReadinessGate>) -> JoinHandle<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_pump(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pump(stderr, Stream::Stderr, tx.clone());
        }
        drop(tx);

        let stdout: Arc<dyn OutputSink> = self
            .config
            .stdout
            .clone()
            .unwrap_or_else(|| Arc::new(self.logger.clone()));
        let stderr: Arc<dyn OutputSink> = self
            .config
            .stderr
            .clone()
            .unwrap_or_else(|| Arc::new(self.logger.clone()));

        tokio::spawn(forward_output(rx, gate, stdout, stderr))
    }
}

/// Read `reader` line by line into the shared channel until EOF.
fn spawn_pump<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if tx.send(OutputLine { stream, text }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Output pump for {:?} stopped: {}", stream, e);
                    break;
                }
            }
        }
    });
}

/// The single consumer of a child's output.
///
/// While the readiness gate is open every line goes to the stdout sink and
/// through the check; the first match resolves the gate. Afterwards lines are
/// teed to their own sinks until both streams end. If the streams end with the
/// gate still open the gate resolves as not ready.
async fn forward_output(
    mut lines: mpsc::UnboundedReceiver<OutputLine>,
    mut gate: Option<ReadinessGate>,
    stdout: Arc<dyn OutputSink>,
    stderr: Arc<dyn OutputSink>,
) {
    while let Some(line) = lines.recv().await {
        if let Some((_, check)) = &gate {
            stdout.write_line(&line.text);
            if check(&line.text) {
                if let Some((tx, _)) = gate.take() {
                    let _ = tx.send(true);
                }
            }
            continue;
        }

        match line.stream {
            Stream::Stdout => stdout.write_line(&line.text),
            Stream::Stderr => stderr.write_line(&line.text),
        }
    }

    if let Some((tx, _)) = gate {
        let _ = tx.send(false);
    }
}

async fn drain(forwarder: &mut JoinHandle<()>) {
    if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut *forwarder)
        .await
        .is_err()
    {
        forwarder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::output::MemorySink;

    fn line(stream: Stream, text: &str) -> OutputLine {
        OutputLine {
            stream,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_forwarder_resolves_gate_on_first_match() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let check: ReadinessCheck = Arc::new(|l: &str| l.contains("ready"));
        let out = Arc::new(MemorySink::new());
        let err = Arc::new(MemorySink::new());

        tx.send(line(Stream::Stderr, "booting")).unwrap();
        tx.send(line(Stream::Stdout, "ready now")).unwrap();
        tx.send(line(Stream::Stderr, "warn: late")).unwrap();
        drop(tx);

        forward_output(rx, Some((ready_tx, check)), out.clone(), err.clone()).await;

        assert!(ready_rx.await.unwrap());
        // Gate output goes to stdout regardless of stream.
        assert_eq!(out.lines(), vec!["booting", "ready now"]);
        assert_eq!(err.lines(), vec!["warn: late"]);
    }

    #[tokio::test]
    async fn test_forwarder_reports_not_ready_at_eof() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let check: ReadinessCheck = Arc::new(|_: &str| false);
        let sink = Arc::new(MemorySink::new());

        tx.send(line(Stream::Stdout, "nothing to see")).unwrap();
        drop(tx);

        forward_output(rx, Some((ready_tx, check)), sink.clone(), sink.clone()).await;

        assert!(!ready_rx.await.unwrap());
        assert_eq!(sink.lines(), vec!["nothing to see"]);
    }
}
