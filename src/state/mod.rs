//! Persistent per-service process records.
//!
//! Every service owns one small record `{status, pid}`. The record is the only
//! thing a short-lived `lid` controller and a long-lived supervisor child share,
//! so it lives on disk in a directory every invocation agrees on (the system
//! temp dir by default).
//!
//! # Layout
//!
//! ```text
//! <state dir>/service-<name>.lid
//!
//! byte 0     status tag (0=Stopped 1=Exited 2=Starting 3=Running 4=Stopping)
//! bytes 1..5 pid, i32 little-endian
//! ```
//!
//! A missing file reads as `{Stopped, 0}`. A file that does not decode is
//! reported as [`Error::ProcessCorrupt`](crate::Error::ProcessCorrupt), which
//! callers keep distinct from "not found".
//!
//! [`MemoryStateStore`] implements the same trait without touching disk so
//! property tests can drive the state machine quickly.

mod file;
mod memory;
mod types;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;
pub use types::{ProcessRecord, ServiceStatus, RECORD_LEN};

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Storage for per-service process records.
///
/// Implementations must make `write` replace the whole record at once so a
/// concurrent reader never observes a torn value.
pub trait StateStore: Send + Sync {
    /// Read the record for `name`, failing with
    /// [`Error::ProcessNotFound`] when none was ever written.
    fn load(&self, name: &str) -> Result<ProcessRecord>;

    /// Read the record for `name`. Missing records read as [`ProcessRecord::STOPPED`].
    fn read(&self, name: &str) -> Result<ProcessRecord> {
        match self.load(name) {
            Err(Error::ProcessNotFound(_)) => Ok(ProcessRecord::STOPPED),
            other => other,
        }
    }

    /// Replace the record for `name`.
    fn write(&self, name: &str, record: ProcessRecord) -> Result<()>;

    /// Where the record lives, for log messages. `None` for non-file stores.
    fn location(&self, name: &str) -> Option<PathBuf>;
}
