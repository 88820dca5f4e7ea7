//! Line sinks for service output and the per-service logger.
//!
//! Everything a supervisor child says about a service goes through a
//! [`ServiceLogger`], which prefixes lines the same way the aggregate
//! `lid.log` expects them:
//!
//! ```text
//! [api] 2024/05/01 12:00:00 Readiness check passed
//! ```

use crate::sentinels;
use parking_lot::Mutex;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Destination for whole lines of text.
pub trait OutputSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Writes lines to the process's stdout.
///
/// A detached supervisor's stdout is a scratch file that nobody reads after
/// the readiness verdict, so such a sink goes quiet once a verdict line has
/// passed through it.
#[derive(Default)]
pub struct StdoutSink {
    until_verdict: AtomicBool,
    quiet: AtomicBool,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop writing after the next line that carries a readiness verdict.
    pub fn quiet_after_verdict(&self) {
        self.until_verdict.store(true, Ordering::SeqCst);
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::SeqCst)
    }
}

impl OutputSink for StdoutSink {
    fn write_line(&self, line: &str) {
        if self.is_quiet() {
            return;
        }

        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", line);
        let _ = out.flush();

        if self.until_verdict.load(Ordering::SeqCst) && sentinels::verdict(line).is_some() {
            self.quiet.store(true, Ordering::SeqCst);
        }
    }
}

/// Appends lines to a file.
pub struct FileSink {
    file: Mutex<File>,
}

impl FileSink {
    pub fn append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl OutputSink for FileSink {
    fn write_line(&self, line: &str) {
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::warn!("Failed to append to log file: {}", e);
        }
    }
}

/// Fans each line out to several sinks.
pub struct TeeSink {
    sinks: Vec<Arc<dyn OutputSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn OutputSink>>) -> Self {
        Self { sinks }
    }
}

impl OutputSink for TeeSink {
    fn write_line(&self, line: &str) {
        for sink in &self.sinks {
            sink.write_line(line);
        }
    }
}

/// Keeps lines in memory. Handy for tests and for hooks that inspect output.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }
}

impl OutputSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Prefixes every line with `[name]` and a local timestamp.
#[derive(Clone)]
pub struct ServiceLogger {
    name: String,
    sink: Arc<dyn OutputSink>,
}

impl ServiceLogger {
    pub fn new(name: impl Into<String>, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            name: name.into(),
            sink,
        }
    }

    pub fn log(&self, message: impl Display) {
        let stamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
        self.sink
            .write_line(&format!("[{}] {} {}", self.name, stamp, message));
    }
}

impl OutputSink for ServiceLogger {
    fn write_line(&self, line: &str) {
        self.log(line);
    }
}
