//! Backgrounding a supervisor child from a short-lived controller.
//!
//! `lid start api` re-executes the current binary as `lid spawn api` with the
//! child's stdout and stderr pointed at a scratch file, then tails that file
//! for a readiness verdict (see [`crate::sentinels`]). Whatever the verdict,
//! the controller lets go of the child and exits; the supervisor child lives
//! on in its own process group.

use crate::error::{Error, Result};
use crate::sentinels::{self, Verdict};
use crate::service::Service;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Poll interval when the scratch file has no new data.
const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Scratch lines kept for the failure preview.
const PREVIEW_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachOutcome {
    /// The supervisor reported the service ready.
    Ready,
    /// The child's output ended before its readiness check matched.
    NotReady,
    /// The supervisor child itself exited before any verdict.
    Exited(Option<i32>),
    /// No verdict within the service's readiness timeout.
    TimedOut,
}

#[derive(Debug)]
pub struct Detached {
    pub outcome: DetachOutcome,
    /// Pid of the supervisor child (not of the service).
    pub supervisor_pid: Option<u32>,
    /// Last lines of the supervisor's output, for reporting failures.
    pub preview: Vec<String>,
}

/// Launch `exe [forward_args] spawn <name>` and wait for a readiness verdict.
pub async fn detach(service: &Service, exe: &Path, forward_args: &[OsString]) -> Result<Detached> {
    let scratch = tempfile::Builder::new()
        .prefix(&format!("lid-{}-", service.name()))
        .suffix(".log")
        .tempfile()?;

    let open_append = || OpenOptions::new().append(true).open(scratch.path());
    let stdout = open_append()?;
    let stderr = open_append()?;

    let mut child = Command::new(exe)
        .args(forward_args)
        .arg("spawn")
        .arg("--detached")
        .arg(service.name())
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(false)
        // Keep terminal signals aimed at the controller away from the supervisor.
        .process_group(0)
        .spawn()
        .map_err(|source| Error::SpawnFailed {
            service: service.name().to_string(),
            source,
        })?;
    let supervisor_pid = child.id();

    tracing::debug!(
        "Detached supervisor for '{}' as PID {:?}, output in {}",
        service.name(),
        supervisor_pid,
        scratch.path().display()
    );

    let reader = tokio::fs::File::from_std(scratch.reopen()?);
    let timeout = service.config().readiness_check_timeout;

    let mut outcome = tokio::select! {
        verdict = tail_for_verdict(reader) => match verdict {
            Verdict::Ready => DetachOutcome::Ready,
            Verdict::NotReady => DetachOutcome::NotReady,
        },
        status = child.wait() => DetachOutcome::Exited(status.ok().and_then(|s| s.code())),
        _ = tokio::time::sleep(timeout) => DetachOutcome::TimedOut,
    };

    let output = std::fs::read_to_string(scratch.path()).unwrap_or_default();

    // A fast service can be reported ready and exit again before the tailer
    // polls; the verdict in the file wins.
    if let DetachOutcome::Exited(_) = outcome {
        match output.lines().find_map(sentinels::verdict) {
            Some(Verdict::Ready) => outcome = DetachOutcome::Ready,
            Some(Verdict::NotReady) => outcome = DetachOutcome::NotReady,
            None => {}
        }
    }

    if outcome == DetachOutcome::TimedOut {
        tracing::warn!(
            "Service '{}' gave no readiness verdict within {:?}",
            service.name(),
            timeout
        );
    }

    let lines: Vec<&str> = output.lines().collect();
    let preview = lines[lines.len().saturating_sub(PREVIEW_LINES)..]
        .iter()
        .map(|l| l.to_string())
        .collect();

    // Dropping the handle releases the child; it keeps running detached.
    drop(child);

    Ok(Detached {
        outcome,
        supervisor_pid,
        preview,
    })
}

/// Follow `file` from the start until a line carries a readiness verdict.
async fn tail_for_verdict(file: tokio::fs::File) -> Verdict {
    let mut reader = BufReader::new(file);
    let mut line = String::new();

    loop {
        match reader.read_line(&mut line).await {
            Ok(0) => tokio::time::sleep(TAIL_POLL_INTERVAL).await,
            // Partial line at EOF: keep it and read the rest later.
            Ok(_) if !line.ends_with('\n') => tokio::time::sleep(TAIL_POLL_INTERVAL).await,
            Ok(_) => {
                if let Some(verdict) = sentinels::verdict(&line) {
                    return verdict;
                }
                line.clear();
            }
            Err(e) => {
                tracing::debug!("Scratch file read failed: {}, retrying", e);
                line.clear();
                tokio::time::sleep(TAIL_POLL_INTERVAL).await;
            }
        }
    }
}
