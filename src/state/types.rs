use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Encoded size of a [`ProcessRecord`].
pub const RECORD_LEN: usize = 5;

/// Lifecycle status persisted for a service.
///
/// ```text
/// Stopped ──► Starting ──► Running ──► Exited
///    ▲           │            │
///    │           ▼            ▼
///    └─────── Stopping ◄──────┘
/// ```
///
/// `Stopped` is only ever written by the shutdown sequence and `Exited` only by
/// the supervisor after an unsolicited exit. That split is what lets the
/// supervisor suppress `on_exit` after a requested stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ServiceStatus {
    Stopped = 0,
    Exited = 1,
    Starting = 2,
    Running = 3,
    Stopping = 4,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Stopped => write!(f, "Stopped"),
            ServiceStatus::Exited => write!(f, "Exited"),
            ServiceStatus::Starting => write!(f, "Starting"),
            ServiceStatus::Running => write!(f, "Running"),
            ServiceStatus::Stopping => write!(f, "Stopping"),
        }
    }
}

impl ServiceStatus {
    pub const ALL: [ServiceStatus; 5] = [
        ServiceStatus::Stopped,
        ServiceStatus::Exited,
        ServiceStatus::Starting,
        ServiceStatus::Running,
        ServiceStatus::Stopping,
    ];

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// `Starting`, `Running` and `Stopping` name a live process.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ServiceStatus::Starting | ServiceStatus::Running | ServiceStatus::Stopping
        )
    }

    /// Check if a status transition is valid according to the state machine.
    ///
    /// Rewriting the same status is allowed (idempotent writes).
    pub fn is_valid_transition(self, to: ServiceStatus) -> bool {
        use ServiceStatus::*;

        if self == to {
            return true;
        }

        matches!(
            (self, to),
            (Stopped | Exited, Starting | Running)
                | (Starting, Running | Stopping | Exited)
                | (Running, Stopping | Exited)
                | (Stopping, Stopped)
        )
    }
}

/// `{status, pid}` as persisted for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub status: ServiceStatus,
    pub pid: i32,
}

impl Default for ProcessRecord {
    fn default() -> Self {
        Self::STOPPED
    }
}

impl ProcessRecord {
    pub const STOPPED: ProcessRecord = ProcessRecord {
        status: ServiceStatus::Stopped,
        pid: 0,
    };

    pub const EXITED: ProcessRecord = ProcessRecord {
        status: ServiceStatus::Exited,
        pid: 0,
    };

    pub fn new(status: ServiceStatus, pid: i32) -> Self {
        Self { status, pid }
    }

    /// The recorded pid as the unsigned form the rest of the crate uses.
    /// Zero and negative values read as 0.
    pub fn pid_u32(&self) -> u32 {
        u32::try_from(self.pid).unwrap_or(0)
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0] = self.status.tag();
        buf[1..].copy_from_slice(&self.pid.to_le_bytes());
        buf
    }

    /// Decode a record read from `path`. The path is only used for the error.
    pub fn decode(bytes: &[u8], path: &Path) -> Result<Self> {
        let corrupt = |reason: String| Error::ProcessCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        if bytes.len() != RECORD_LEN {
            return Err(corrupt(format!(
                "expected {} bytes, found {}",
                RECORD_LEN,
                bytes.len()
            )));
        }

        let status = ServiceStatus::from_tag(bytes[0])
            .ok_or_else(|| corrupt(format!("unknown status tag {}", bytes[0])))?;
        let mut pid = [0u8; 4];
        pid.copy_from_slice(&bytes[1..]);

        Ok(Self {
            status,
            pid: i32::from_le_bytes(pid),
        })
    }
}
