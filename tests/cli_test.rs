//! End-to-end tests driving the `lid` binary with a temporary service file.
//!
//! Every test writes its own `lid.yaml` whose state directory and log file
//! live in a fresh temp dir, so records never leak between tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn lid_binary() -> String {
    env!("CARGO_BIN_EXE_lid").to_string()
}

/// A service file in a temp dir. Stops every service on drop so a failing
/// test does not leave supervisors behind.
struct LidEnv {
    dir: TempDir,
    config: PathBuf,
}

impl LidEnv {
    fn new(services: &str) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = dir.path().join("lid.yaml");
        let content = format!(
            "log_file: {log}\nstate_dir: {state}\nservices:\n{services}",
            log = dir.path().join("lid.log").display(),
            state = dir.path().join("state").display(),
            services = services,
        );
        fs::write(&config, content).expect("Failed to write test config");
        Self { dir, config }
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(lid_binary())
            .arg("--config")
            .arg(&self.config)
            .args(args)
            .output()
            .expect("Failed to run lid")
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("state").join(format!("service-{}.lid", name))
    }

    fn log_path(&self) -> PathBuf {
        self.dir.path().join("lid.log")
    }
}

impl Drop for LidEnv {
    fn drop(&mut self) {
        let _ = self.run(&["stop"]);
    }
}

const SERVICES: &str = r#"
  sleeper:
    command: ["bash", "-c", "echo up; sleep 30"]
    ready_when: { contains: "up" }
    readiness_check_timeout: 5s
  quick-fail:
    command: ["bash", "-c", "echo booting; exit 3"]
    ready_when: { contains: "never printed" }
    readiness_check_timeout: 5s
"#;

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// The record as (status tag, pid).
fn read_record(path: &Path) -> Option<(u8, i32)> {
    let bytes = fs::read(path).ok()?;
    if bytes.len() != 5 {
        return None;
    }
    Some((bytes[0], i32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]])))
}

/// The supervisor may still be committing its final record when the
/// controller returns.
fn wait_for_record(path: &Path, want: (u8, i32), timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if read_record(path) == Some(want) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

fn is_pid_alive(pid: i32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn wait_for_pid_exit(pid: i32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !is_pid_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

// ============================================================================
// Help and dispatch
// ============================================================================

#[test]
fn test_help_lists_commands_and_services() {
    let env = LidEnv::new(SERVICES);
    let output = env.run(&["--help"]);

    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["list", "start", "stop", "restart", "logs", "spawn"] {
        assert!(text.contains(command), "help should mention {}", command);
    }
    assert!(text.contains("Available services:"));
    assert!(text.contains("quick-fail"));
    assert!(text.contains("sleeper"));
}

#[test]
fn test_unknown_command_fails() {
    let env = LidEnv::new(SERVICES);
    let output = env.run(&["frobnicate"]);

    assert!(!output.status.success());
}

#[test]
fn test_list_and_ls_alias() {
    let env = LidEnv::new(SERVICES);

    for command in ["list", "ls"] {
        let output = env.run(&[command]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let text = stdout(&output);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Name"));
        assert!(lines[1].starts_with("quick-fail"));
        assert!(lines[2].starts_with("sleeper"));
        assert!(lines[1].contains("Stopped"));
        assert!(lines[2].contains("Stopped"));
    }
}

#[test]
fn test_invalid_config_is_reported() {
    let env = LidEnv::new("  broken:\n    command: []\n");
    let output = env.run(&["list"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Error:"));
}

// ============================================================================
// start / list / stop
// ============================================================================

#[test]
fn test_start_list_stop_roundtrip() {
    let env = LidEnv::new(SERVICES);

    let started = env.run(&["start", "sleeper"]);
    assert!(
        started.status.success(),
        "stdout: {}\nstderr: {}",
        stdout(&started),
        stderr(&started)
    );
    assert!(stdout(&started).contains("sleeper: Running with PID"));

    let (tag, pid) = read_record(&env.record_path("sleeper")).expect("record written");
    assert_eq!(tag, 3, "record should say Running");
    assert!(pid > 0);
    assert!(is_pid_alive(pid));

    let listed = env.run(&["list"]);
    let text = stdout(&listed);
    let row = text
        .lines()
        .find(|l| l.starts_with("sleeper"))
        .expect("sleeper row");
    assert!(row.contains("Running"));
    assert!(row.contains(&pid.to_string()));

    let again = env.run(&["start", "sleeper"]);
    assert!(again.status.success());
    assert!(stdout(&again).contains(&format!("sleeper: Running with PID {}", pid)));

    let stopped = env.run(&["stop", "sleeper"]);
    assert!(stopped.status.success(), "stderr: {}", stderr(&stopped));
    assert!(stdout(&stopped).contains("sleeper: Stopped"));
    assert!(wait_for_pid_exit(pid, Duration::from_secs(2)));
    assert_eq!(read_record(&env.record_path("sleeper")), Some((0, 0)));

    let log = fs::read_to_string(env.log_path()).unwrap();
    assert!(log.contains("[sleeper]"));
    assert!(log.contains("Readiness check passed"));
    assert!(log.contains("Stopping service"));
}

#[test]
fn test_stop_never_started_reports_already_down() {
    let env = LidEnv::new(SERVICES);

    let output = env.run(&["stop", "sleeper"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("sleeper: service already down"));
    assert!(!env.record_path("sleeper").exists());
}

#[test]
fn test_failed_readiness_exits_nonzero() {
    let env = LidEnv::new(SERVICES);

    let output = env.run(&["start", "quick-fail"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("quick-fail"), "stderr: {}", err);
    assert!(err.contains("1 service(s) failed"));

    assert!(
        wait_for_record(&env.record_path("quick-fail"), (1, 0), Duration::from_secs(2)),
        "record should say Exited"
    );
}

#[test]
fn test_unknown_service_is_rejected() {
    let env = LidEnv::new(SERVICES);

    let output = env.run(&["stop", "ghost"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Unknown service: ghost"));
    assert!(err.contains("Hint:"));
}

#[test]
fn test_restart_replaces_process() {
    let env = LidEnv::new(SERVICES);

    assert!(env.run(&["start", "sleeper"]).status.success());
    let (_, first) = read_record(&env.record_path("sleeper")).unwrap();

    let output = env.run(&["restart", "sleeper"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let (tag, second) = read_record(&env.record_path("sleeper")).unwrap();
    assert_eq!(tag, 3);
    assert_ne!(first, second);
    assert!(wait_for_pid_exit(first, Duration::from_secs(2)));
}

#[test]
fn test_spawn_runs_in_foreground() {
    let env = LidEnv::new(
        r#"
  once:
    command: ["bash", "-c", "echo hello from once; exit 4"]
"#,
    );

    let output = env.run(&["spawn", "once"]);

    // The service's own exit code is not the supervisor's.
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("[once]"));
    assert!(text.contains("hello from once"));
    assert!(text.contains("Exited: exit status 4"));
    assert_eq!(read_record(&env.record_path("once")), Some((1, 0)));
}

/// Parent pid of `pid`, from `/proc/<pid>/stat`.
#[cfg(target_os = "linux")]
fn parent_pid(pid: i32) -> Option<i32> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    // The command name may contain spaces; fields resume after the last ')'.
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(target_os = "linux")]
#[test]
fn test_detached_supervisor_stdout_stops_after_verdict() {
    let env = LidEnv::new(
        r#"
  chatty:
    command: ["bash", "-c", "while true; do echo tick; sleep 0.05; done"]
    ready_when: { contains: "tick" }
    readiness_check_timeout: 5s
"#,
    );

    let started = env.run(&["start", "chatty"]);
    assert!(started.status.success(), "stderr: {}", stderr(&started));

    let (_, pid) = read_record(&env.record_path("chatty")).expect("record written");
    let supervisor = parent_pid(pid).expect("supervisor pid");
    // The supervisor's stdout is the scratch file, unlinked by now.
    let scratch = format!("/proc/{}/fd/1", supervisor);

    std::thread::sleep(Duration::from_millis(100));
    let before = fs::metadata(&scratch).expect("scratch stdout").len();
    let log_before = fs::read_to_string(env.log_path()).unwrap().matches("tick").count();

    std::thread::sleep(Duration::from_millis(500));
    let after = fs::metadata(&scratch).expect("scratch stdout").len();
    let log_after = fs::read_to_string(env.log_path()).unwrap().matches("tick").count();

    assert_eq!(before, after, "scratch stdout kept growing");
    assert!(log_after > log_before, "service output should still reach lid.log");
}
