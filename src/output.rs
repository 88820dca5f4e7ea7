use parking_lot::Mutex;
use std::io::Write;

/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!` so tests
/// can capture what a command would have shown.
pub trait UserOutput: Send + Sync {
    /// Informational status message (e.g., "api: Running with PID 4242")
    fn status(&self, message: &str);

    /// Success message (e.g., "api: Ready")
    fn success(&self, message: &str);

    /// Warning message (e.g., "api: no readiness verdict after 5s")
    fn warning(&self, message: &str);

    /// Error message (e.g., "api: failed to spawn")
    fn error(&self, message: &str);

    /// Raw block written as-is (tables, log previews).
    fn block(&self, text: &str);
}

/// Standard CLI output: stdout for normal lines, stderr for problems.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("\x1b[32m{}\x1b[0m", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }

    fn block(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Records everything, tagged by kind. Used by tests.
#[derive(Default)]
pub struct CapturedOutput {
    lines: Mutex<Vec<(&'static str, String)>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(&'static str, String)> {
        self.lines.lock().clone()
    }

    pub fn text(&self) -> String {
        self.lines
            .lock()
            .iter()
            .map(|(_, l)| l.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push(&self, kind: &'static str, message: &str) {
        self.lines.lock().push((kind, message.to_string()));
    }
}

impl UserOutput for CapturedOutput {
    fn status(&self, message: &str) {
        self.push("status", message);
    }

    fn success(&self, message: &str) {
        self.push("success", message);
    }

    fn warning(&self, message: &str) {
        self.push("warning", message);
    }

    fn error(&self, message: &str) {
        self.push("error", message);
    }

    fn block(&self, text: &str) {
        self.push("block", text);
    }
}
