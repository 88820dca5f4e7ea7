//! Operating-system process probing and signalling.

use crate::error::{validate_pid, validate_pid_for_check, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, killpg, Signal};
use nix::unistd::{getpgid, Pid};

/// Whether `pid` names a live, non-zombie process.
///
/// `kill(pid, 0)` alone is not enough: a child that has exited but not yet
/// been reaped still answers it. On Linux the `/proc/<pid>/status` state is
/// checked as well so a stop issued from the supervising process sees the
/// child go away as soon as it dies.
pub fn is_process_alive(pid: u32) -> bool {
    let Some(nix_pid) = validate_pid_for_check(pid) else {
        return false;
    };

    match signal::kill(nix_pid, None) {
        Ok(()) => {}
        // Exists but belongs to someone else.
        Err(Errno::EPERM) => {}
        Err(_) => return false,
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            if let Some(state) = proc_state(&status) {
                return !matches!(state, 'Z' | 'X' | 'x');
            }
        }
    }

    true
}

/// Single-letter state from the `State:` line of `/proc/<pid>/status`.
#[cfg(target_os = "linux")]
fn proc_state(status: &str) -> Option<char> {
    status
        .lines()
        .find(|line| line.starts_with("State:"))
        .and_then(|line| line["State:".len()..].chars().find(|c| c.is_alphabetic()))
}

/// The process group to signal for `pid`, if `pid` leads its own group.
///
/// Supervised children are spawned with `process_group(0)`, so they lead a
/// group holding any grandchildren. Anything else is signalled individually
/// so an unrelated group (ours included) is never hit.
fn own_process_group(pid: Pid) -> Option<Pid> {
    match getpgid(Some(pid)) {
        Ok(pgid) if pgid == pid => Some(pgid),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(
                "Failed to get PGID for PID {}: {} (process may have exited)",
                pid,
                e
            );
            None
        }
    }
}

/// Send `sig` to the process group led by `pid`, falling back to `pid` alone.
pub fn signal_process(pid: u32, sig: Signal, service_name: &str) -> Result<()> {
    let nix_pid = validate_pid(pid, service_name)?;

    let result = match own_process_group(nix_pid) {
        Some(pgid) => killpg(pgid, sig).or_else(|e| {
            tracing::debug!(
                "killpg failed for PGID {} (service: {}): {}, trying individual PID",
                pgid,
                service_name,
                e
            );
            signal::kill(nix_pid, sig)
        }),
        None => signal::kill(nix_pid, sig),
    };

    result.map_err(|e| std::io::Error::from(e).into())
}

/// Seconds since `pid` started, from `/proc/<pid>/stat` and `/proc/uptime`.
#[cfg(target_os = "linux")]
pub fn process_uptime_secs(pid: u32) -> Option<u64> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let fields = super::resources::parse_proc_stat(&stat);
    // Field 22 (starttime) is index 19 once pid and comm are dropped.
    let start_ticks: f64 = fields.get(19)?.parse().ok()?;

    let uptime = std::fs::read_to_string("/proc/uptime").ok()?;
    let uptime_secs: f64 = uptime.split_whitespace().next()?.parse().ok()?;

    let elapsed = uptime_secs - start_ticks / super::resources::clock_ticks_per_sec() as f64;
    (elapsed >= 0.0).then_some(elapsed as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn process_uptime_secs(_pid: u32) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn test_invalid_pids_are_not_alive() {
        assert!(!is_process_alive(0));
        assert!(!is_process_alive(u32::MAX));
    }

    #[test]
    fn test_reaped_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_process_alive(pid));
    }

    #[test]
    fn test_zombie_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        // Give it time to exit without reaping it.
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(!is_process_alive(pid));
        child.wait().unwrap();
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_proc_state_parsing() {
        assert_eq!(proc_state("Name:\tbash\nState:\tZ (zombie)\n"), Some('Z'));
        assert_eq!(proc_state("State:\tS (sleeping)"), Some('S'));
        assert_eq!(proc_state("Name:\tbash\n"), None);
    }

    #[test]
    fn test_signal_process_rejects_pid_zero() {
        assert!(signal_process(0, Signal::SIGTERM, "svc").is_err());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_uptime_of_current_process() {
        assert!(process_uptime_secs(std::process::id()).is_some());
    }
}
