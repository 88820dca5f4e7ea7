//! Resource usage snapshots for `lid list`.
//!
//! Linux reads `/proc/{pid}/stat` and `/proc/{pid}/status`; macOS shells out
//! to `ps`; other platforms report nothing. CPU is the lifetime average since
//! the process started, not an instantaneous rate.

/// All fields are `Option` because the process can vanish between the
/// liveness probe and the query. Callers render `None` as `-`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceUsage {
    /// Resident set size in bytes.
    pub memory_rss_bytes: Option<u64>,
    /// CPU percentage (per core, so it can exceed 100 on multi-core systems).
    pub cpu_percent: Option<f64>,
}

impl ResourceUsage {
    pub async fn query(pid: u32) -> Self {
        #[cfg(target_os = "linux")]
        {
            Self::query_linux(pid).await
        }

        #[cfg(target_os = "macos")]
        {
            Self::query_macos(pid).await
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = pid;
            Self::default()
        }
    }

    #[cfg(target_os = "linux")]
    async fn query_linux(pid: u32) -> Self {
        let Ok(stat) = tokio::fs::read_to_string(format!("/proc/{}/stat", pid)).await else {
            return Self::default();
        };

        let fields = parse_proc_stat(&stat);
        if fields.is_empty() {
            return Self::default();
        }

        // Indices are 0-based from the state field (field 3 in `man 5 proc`).
        let utime = fields.get(11).and_then(|s| s.parse::<u64>().ok());
        let stime = fields.get(12).and_then(|s| s.parse::<u64>().ok());
        let starttime = fields.get(19).and_then(|s| s.parse::<u64>().ok());
        let rss_pages = fields.get(21).and_then(|s| s.parse::<u64>().ok());

        let cpu_percent = match (utime, stime, starttime) {
            (Some(u), Some(s), Some(start)) => calculate_cpu_percent(u, s, start).await,
            _ => None,
        };

        // VmRSS is in kB and more accurate than the page count in stat.
        let rss_from_status = tokio::fs::read_to_string(format!("/proc/{}/status", pid))
            .await
            .ok()
            .and_then(|content| parse_vmrss_from_status(&content));

        Self {
            memory_rss_bytes: rss_from_status.or(rss_pages.map(|p| p * 4096)),
            cpu_percent,
        }
    }

    #[cfg(target_os = "macos")]
    async fn query_macos(pid: u32) -> Self {
        let Ok(output) = tokio::process::Command::new("ps")
            .args(["-p", &pid.to_string(), "-o", "rss=,%cpu="])
            .output()
            .await
        else {
            return Self::default();
        };

        if !output.status.success() {
            return Self::default();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut parts = stdout.split_whitespace();
        Self {
            memory_rss_bytes: parts.next().and_then(|kb| kb.parse::<u64>().ok()).map(|kb| kb * 1024),
            cpu_percent: parts.next().and_then(|c| c.parse::<f64>().ok()),
        }
    }

    /// RSS in whole megabytes (10^6 bytes), as shown in the status table.
    pub fn memory_mb(&self) -> Option<u64> {
        self.memory_rss_bytes.map(|b| b / 1_000_000)
    }
}

/// Kernel clock ticks per second; 100 if sysconf fails.
pub(crate) fn clock_ticks_per_sec() -> u64 {
    nix::unistd::sysconf(nix::unistd::SysconfVar::CLK_TCK)
        .ok()
        .flatten()
        .map(|v| v as u64)
        .unwrap_or(100)
}

#[cfg(target_os = "linux")]
async fn calculate_cpu_percent(utime: u64, stime: u64, starttime: u64) -> Option<f64> {
    let uptime = tokio::fs::read_to_string("/proc/uptime").await.ok()?;
    let uptime_secs: f64 = uptime.split_whitespace().next()?.parse().ok()?;

    let hertz = clock_ticks_per_sec() as f64;
    let elapsed_secs = uptime_secs - starttime as f64 / hertz;
    if elapsed_secs <= 0.0 {
        return None;
    }

    Some(100.0 * ((utime + stime) as f64 / hertz) / elapsed_secs)
}

/// Fields of `/proc/{pid}/stat` after `pid (comm)`.
///
/// `comm` may contain spaces and parentheses, so split after the last `)`.
pub(crate) fn parse_proc_stat(content: &str) -> Vec<String> {
    let Some(comm_end) = content.rfind(')') else {
        return Vec::new();
    };

    content[comm_end + 1..]
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// `VmRSS:    12345 kB` in bytes.
fn parse_vmrss_from_status(content: &str) -> Option<u64> {
    let line = content.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_nonexistent_process() {
        let usage = ResourceUsage::query(u32::MAX).await;
        assert_eq!(usage, ResourceUsage::default());
    }

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn test_query_current_process() {
        let usage = ResourceUsage::query(std::process::id()).await;
        if let Some(rss) = usage.memory_rss_bytes {
            assert!(rss > 0);
        }
    }

    #[test]
    fn test_parse_proc_stat_with_complex_comm() {
        let content = "12345 (foo (bar) baz) S 12344 12345 12345 34816 12345 4194304 1234 0 0 0 10 5 0 0 20 0 1 0 123456789 12345678 1234";
        let fields = parse_proc_stat(content);
        assert_eq!(fields[0], "S");
        assert_eq!(fields[11], "10");
        assert_eq!(fields[19], "123456789");
        assert_eq!(fields[21], "1234");
    }

    #[test]
    fn test_parse_vmrss() {
        let content = "Name:   bash\nVmRSS:    12345 kB\n";
        assert_eq!(parse_vmrss_from_status(content), Some(12345 * 1024));
        assert_eq!(parse_vmrss_from_status("Name: x\n"), None);
    }

    #[test]
    fn test_memory_mb() {
        let usage = ResourceUsage {
            memory_rss_bytes: Some(25_600_000),
            cpu_percent: None,
        };
        assert_eq!(usage.memory_mb(), Some(25));
    }
}
