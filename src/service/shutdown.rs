use super::process::{is_process_alive, signal_process};
use super::{Service, StopOutcome};
use crate::error::{Error, Result};
use crate::state::ServiceStatus;
use nix::sys::signal::Signal;
use std::time::Duration;
use tokio::time::Instant;

/// Liveness poll interval while waiting for a signalled process to go away.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Writes `{Stopped, 0}` when dropped, whether `stop()` returns, fails or is
/// cancelled mid-poll.
struct StoppedOnDrop<'a> {
    service: &'a Service,
}

impl Drop for StoppedOnDrop<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.service.write_record(ServiceStatus::Stopped, 0) {
            tracing::error!(
                "Service '{}': failed to record stop: {}",
                self.service.name(),
                e
            );
        }
    }
}

impl Service {
    /// Stop the recorded process: graceful signal, bounded wait, forced kill.
    ///
    /// Returns `AlreadyDown` without touching the record when nothing is
    /// running. Otherwise the record goes to `Stopping` before any signal and
    /// always ends as `Stopped`. `Err(ShutdownTimeout)` means SIGKILL was
    /// sent but not waited for.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let Some(pid) = self.running_pid() else {
            return Ok(StopOutcome::AlreadyDown);
        };

        self.logger().log("Stopping service");
        self.write_record(ServiceStatus::Stopping, pid)?;
        let _epilogue = StoppedOnDrop { service: self };

        if let Err(e) = signal_process(pid, self.config().exit_signal, self.name()) {
            self.logger()
                .log(format!("Signal error: {}, using SIGKILL", e));
            let _ = signal_process(pid, Signal::SIGKILL, self.name());
        }

        let timeout = self.config().graceful_shutdown_timeout;
        if wait_for_exit(pid, timeout).await {
            return Ok(StopOutcome::Stopped);
        }

        self.logger()
            .log("Graceful shutdown timeout. Attempting to kill process");
        if let Err(e) = signal_process(pid, Signal::SIGKILL, self.name()) {
            self.logger().log(format!("Failed to kill process: {}", e));
        }

        Err(Error::ShutdownTimeout {
            service: self.name().to_string(),
            timeout,
        })
    }
}

/// Poll until `pid` is gone. Returns false if it outlives `timeout`.
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !is_process_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(STOP_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_exit_on_dead_pid_is_immediate() {
        let started = std::time::Instant::now();
        assert!(wait_for_exit(0, Duration::from_secs(5)).await);
        assert!(started.elapsed() < STOP_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_wait_for_exit_times_out_on_live_pid() {
        let started = std::time::Instant::now();
        assert!(!wait_for_exit(std::process::id(), Duration::from_millis(120)).await);
        assert!(started.elapsed() >= Duration::from_millis(120));
    }
}
