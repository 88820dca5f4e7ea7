#![allow(unused_assignments)]

//! # lid
//!
//! A small process supervisor. One binary is both the controller you type
//! commands into and the supervisor it leaves behind for each service.
//!
//! ## How it fits together
//!
//! - **Registry**: the services of one `lid` binary, by unique name
//! - **State store**: one 5-byte `service-<name>.lid` record per service,
//!   the only thing controller and supervisor processes share
//! - **Supervision engine**: spawns the child, gates on a readiness check
//!   over its output, waits for exit and runs the hooks
//! - **Detach**: `lid start` re-executes itself as `lid spawn <name>` and
//!   waits only for the readiness verdict
//! - **Shutdown**: exit signal, bounded wait, `SIGKILL`, always ending
//!   `Stopped`
//!
//! ## Quick Start
//!
//! ```no_run
//! use lid::{Lid, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let mut lid = Lid::new().expect("executable path");
//!     lid.register(
//!         "web",
//!         ServiceConfig::new(["python3", "-m", "http.server", "8080"])
//!             .ready_when_contains("Serving HTTP"),
//!     )
//!     .expect("unique name");
//!     lid.run().await
//! }
//! ```
//!
//! Services can also be declared in a `lid.yaml` beside the `lid` binary;
//! see [`config::Config`].

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod detach;
pub mod error;
pub mod logging;
pub mod output;
pub mod registry;
pub mod sentinels;
pub mod service;
pub mod state;

pub use app::{Lid, LidOptions};
pub use config::{Config, Parser, ServiceConfig};
pub use error::{Error, Result};
pub use registry::Registry;
pub use service::{ExitInfo, Service, ServiceContext, ServiceHandle, StopOutcome};
pub use state::{FileStateStore, MemoryStateStore, ProcessRecord, ServiceStatus, StateStore};
