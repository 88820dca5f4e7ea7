//! The per-service supervision engine.
//!
//! [`Service::start`] spawns the child, gates on readiness, waits for the
//! child to exit and classifies the exit. [`Service::stop`] is the shutdown
//! sequence: graceful signal, 50 ms liveness polling, forced kill, and a
//! `Stopped` record no matter what.
//!
//! Both operations may run in different processes for the same service; they
//! coordinate only through the [`StateStore`](crate::state::StateStore).

mod handle;
mod output;
mod process;
mod resources;
mod shutdown;
mod supervisor;
mod types;

pub use handle::ServiceHandle;
pub use output::{FileSink, MemorySink, OutputSink, ServiceLogger, StdoutSink, TeeSink};
pub use process::{is_process_alive, process_uptime_secs, signal_process};
pub use resources::ResourceUsage;
pub use shutdown::STOP_POLL_INTERVAL;
pub use supervisor::{Service, ServiceContext};
pub use types::{ExitInfo, StopOutcome};
